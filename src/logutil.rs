//! Log sanitation helpers.
//!
//! Message bodies and bot names are user-controlled; escaping keeps every
//! log record on a single line and free of raw control characters.

/// Escape a string for single-line logging and clamp it to a short preview.
///
/// Newlines, carriage returns, tabs and backslashes are backslash-escaped;
/// any other control character is rendered as `\xNN`. Input longer than the
/// preview budget is truncated with an ellipsis.
pub fn escape_log(s: &str) -> String {
    const MAX_PREVIEW: usize = 160;
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                use std::fmt::Write;
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}
