//! Prompt templates for each workflow phase.

pub struct PhasePrompts;

impl PhasePrompts {
    /// Exploration: summarize what the page is and what can be tested.
    pub fn page_analysis(cleaned_markup: &str) -> String {
        format!(
            r#"You are a senior QA engineer analyzing a web page before writing tests.

Below is the simplified HTML of the page. Describe concisely:
1. What the page is (login form, dashboard, article, shop, ...).
2. The interactive elements present (forms, inputs, buttons, links) and their identifiers.
3. The main user journeys worth testing.

Keep the summary short and factual. Do not invent elements that are not in the HTML.

HTML:
{cleaned_markup}"#
        )
    }

    /// Design: turn the page summary into a numbered test plan.
    pub fn design(page_summary: &str) -> String {
        format!(
            r#"You are a senior QA engineer designing an automated test for a web page.

Based on the page analysis below, write a test plan as a short numbered list of
concrete steps. Each step must be executable by a browser automation script:
navigate, fill, click, assert. Prefer one focused user journey over broad coverage.

Page analysis:
{page_summary}

Respond with the numbered plan only."#
        )
    }

    /// Redesign: revise an existing plan around a human critique.
    pub fn redesign(page_summary: &str, previous_plan: &str, user_feedback: &str) -> String {
        format!(
            r#"You are a senior QA engineer revising a test plan after review.

Page analysis:
{page_summary}

Previous plan:
{previous_plan}

Reviewer feedback:
{user_feedback}

Rewrite the plan as a short numbered list that addresses the feedback. Keep steps
that the reviewer did not object to. Respond with the numbered plan only."#
        )
    }

    /// Implement: emit a runnable Playwright script for the plan.
    pub fn implement(url: &str, test_plan: &str, cleaned_markup: &str, feedback: &str) -> String {
        let feedback_section = if feedback.is_empty() {
            String::new()
        } else {
            format!("\nFix the following problems from the previous attempt:\n{feedback}\n")
        };

        format!(
            r#"You are a senior QA engineer writing a Python Playwright test script.

Target URL: {url}

Test plan:
{test_plan}

Simplified page HTML (use these selectors, do not invent new ones):
{cleaned_markup}
{feedback_section}
Requirements:
- Use `from playwright.sync_api import sync_playwright` and a headless Chromium browser.
- Implement every step of the plan with explicit waits where needed.
- If every assertion holds, print exactly "{marker}" as the last line.
- If anything fails, let the exception propagate so the failure is visible.
- Respond with the complete script only, no explanations."#,
            marker = crate::code_parser::SUCCESS_MARKER,
        )
    }
}
