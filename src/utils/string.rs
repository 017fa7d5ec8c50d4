//! Char-safe text helpers.
//!
//! Node content is arbitrary model output, so every cut is made on
//! character boundaries rather than byte offsets.

/// Return a preview of `s` up to `n` characters, with a trailing `...` when
/// anything was cut.
pub fn preview(s: &str, n: usize) -> String {
    let mut chars = s.chars();
    let mut prefix: String = chars.by_ref().take(n).collect();
    if chars.next().is_some() {
        prefix.push_str("...");
    }
    prefix
}

/// Collapse runs of whitespace (including newlines) into single spaces.
pub fn squash_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
