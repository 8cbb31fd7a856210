//! DOM simplifier producing a token-efficient, structural view of a page.
//!
//! The output keeps the element structure and the attributes a test
//! generator needs for locators, and drops everything else.

use regex::{Captures, Regex};

/// Attributes worth keeping for locator generation.
const ALLOWED_ATTRS: &[&str] = &[
    "id",
    "name",
    "class",
    "type",
    "placeholder",
    "aria-label",
    "role",
    "href",
    "title",
    "value",
    "data-test",
    "data-testid",
    "alt",
    "for",
];

/// Tags removed together with their content.
const NOISY_BLOCK_TAGS: &[&str] = &["script", "style", "noscript", "head", "svg", "iframe", "video"];

/// Tags removed entirely but without nested content.
const NOISY_VOID_TAGS: &[&str] = &["meta", "link", "img", "path", "source", "track"];

/// Simplify raw markup into a bounded structural string.
///
/// Output length is capped at roughly `token_budget * 4` characters
/// (one token is about four characters); truncation repairs a trailing
/// half-open tag. Empty input yields empty output.
pub fn clean_dom(html: &str, token_budget: usize) -> String {
    if html.is_empty() {
        return String::new();
    }

    let mut cleaned = html.to_string();

    for tag in NOISY_BLOCK_TAGS {
        let pattern = format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>");
        let re = Regex::new(&pattern).expect("Invalid block tag regex");
        cleaned = re.replace_all(&cleaned, "").into_owned();
    }
    for tag in NOISY_VOID_TAGS {
        let pattern = format!(r"(?is)<{tag}\b[^>]*/?>");
        let re = Regex::new(&pattern).expect("Invalid void tag regex");
        cleaned = re.replace_all(&cleaned, "").into_owned();
    }

    let comments = Regex::new(r"(?s)<!--.*?-->").expect("Invalid comment regex");
    cleaned = comments.replace_all(&cleaned, "").into_owned();

    cleaned = filter_attributes(&cleaned);

    let blank_lines = Regex::new(r"\n\s*\n").expect("Invalid blank line regex");
    cleaned = blank_lines.replace_all(&cleaned, "\n").into_owned();
    let whitespace = Regex::new(r"\s+").expect("Invalid whitespace regex");
    cleaned = whitespace.replace_all(&cleaned, " ").into_owned();

    truncate_repaired(cleaned, token_budget * 4)
}

/// Rewrite every opening tag keeping only the allow-listed attributes.
fn filter_attributes(html: &str) -> String {
    let tag_re = Regex::new(r#"<([a-zA-Z][a-zA-Z0-9-]*)((?:[^>"']|"[^"]*"|'[^']*')*)(/?)>"#)
        .expect("Invalid tag regex");
    let attr_re = Regex::new(
        r#"([a-zA-Z_][a-zA-Z0-9_:.-]*)\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)|([a-zA-Z_][a-zA-Z0-9_:.-]*)"#,
    )
    .expect("Invalid attribute regex");

    tag_re
        .replace_all(html, |caps: &Captures<'_>| {
            let name = &caps[1];
            let attrs = &caps[2];
            let self_close = &caps[3];

            let mut kept = String::new();
            for attr in attr_re.captures_iter(attrs) {
                let key = attr
                    .get(1)
                    .or_else(|| attr.get(3))
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                if !ALLOWED_ATTRS.contains(&key.to_ascii_lowercase().as_str()) {
                    continue;
                }
                kept.push(' ');
                match attr.get(2) {
                    Some(value) => {
                        kept.push_str(key);
                        kept.push('=');
                        kept.push_str(value.as_str());
                    }
                    None => kept.push_str(key),
                }
            }

            format!("<{name}{kept}{self_close}>")
        })
        .into_owned()
}

fn truncate_repaired(mut text: String, limit: usize) -> String {
    if text.len() <= limit {
        return text;
    }

    let mut end = limit;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);

    // Drop a trailing half-open tag.
    let last_open = text.rfind('<');
    let last_close = text.rfind('>');
    if let Some(open) = last_open {
        if last_close.map_or(true, |close| open > close) {
            text.truncate(open);
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUDGET: usize = 8000;

    #[test]
    fn test_empty_input() {
        assert_eq!(clean_dom("", BUDGET), "");
    }

    #[test]
    fn test_script_removal() {
        let html = "<html><script>alert('x')</script><body><h1>Hi</h1></body></html>";
        let clean = clean_dom(html, BUDGET);

        assert!(!clean.contains("<script>"));
        assert!(!clean.contains("alert"));
        assert!(clean.contains("<h1>Hi</h1>"));
    }

    #[test]
    fn test_attribute_filtering() {
        let html = r#"<input type="text" onclick="bad()" data-test="login-input" style="color:red">"#;
        let clean = clean_dom(html, BUDGET);

        assert!(!clean.contains("onclick"));
        assert!(!clean.contains("style"));
        assert!(clean.contains(r#"data-test="login-input""#));
        assert!(clean.contains(r#"type="text""#));
    }

    #[test]
    fn test_comment_removal() {
        let html = "<body><!-- hidden note --><p>visible</p></body>";
        let clean = clean_dom(html, BUDGET);

        assert!(!clean.contains("hidden note"));
        assert!(clean.contains("visible"));
    }

    #[test]
    fn test_noisy_void_tags_removed() {
        let html = r#"<head><meta charset="utf-8"></head><body><img src="a.png"><a href="/login">Login</a></body>"#;
        let clean = clean_dom(html, BUDGET);

        assert!(!clean.contains("img"));
        assert!(!clean.contains("meta"));
        assert!(clean.contains(r#"href="/login""#));
    }

    #[test]
    fn test_whitespace_collapse() {
        let html = "<body>\n\n\n   <p>a</p>    <p>b</p>\n</body>";
        let clean = clean_dom(html, BUDGET);

        assert!(!clean.contains("\n"));
        assert!(!clean.contains("  "));
    }

    #[test]
    fn test_truncation_respects_budget() {
        let html = format!("<body>{}</body>", "<p>row</p>".repeat(10_000));
        let clean = clean_dom(&html, 100);

        assert!(clean.len() <= 400);
    }

    #[test]
    fn test_truncation_repairs_broken_tag() {
        let html = format!("<body>{}</body>", "<p>x</p>".repeat(10_000));
        let clean = clean_dom(&html, 100);

        let last_open = clean.rfind('<');
        let last_close = clean.rfind('>');
        match (last_open, last_close) {
            (Some(open), Some(close)) => assert!(close > open),
            (Some(_), None) => panic!("dangling open tag survived truncation"),
            _ => {}
        }
    }
}
