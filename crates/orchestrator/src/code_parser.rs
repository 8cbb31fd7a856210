//! Post-processing of model output and sandbox logs.

/// Literal the generated script must print on success. Anything else in
/// the execution log, including silence, counts as a failure.
pub const SUCCESS_MARKER: &str = "TEST PASSED";

/// Strip markdown code fences so the script is directly executable.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```python", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// A run passes only on the exact marker; partial matches do not count.
pub fn contains_success_marker(output: &str) -> bool {
    output.contains(SUCCESS_MARKER)
}

/// Last `max_chars` of an execution log, for feeding back into prompts.
pub fn log_tail(log: &str, max_chars: usize) -> &str {
    let mut start = log.len().saturating_sub(max_chars);
    while start < log.len() && !log.is_char_boundary(start) {
        start += 1;
    }
    &log[start..]
}
