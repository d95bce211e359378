//! Output size limits

/// Cap applied to tool stdout/stderr and fetched page text
pub const MAX_TOOL_OUTPUT: usize = 50_000;

const TRUNCATION_MARKER: &str = "\n[Output truncated...]";

/// Truncate to `limit` bytes on a char boundary, appending a marker when
/// anything was dropped
pub fn truncate_output(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }

    let mut end = limit;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &text[..end], TRUNCATION_MARKER)
}
