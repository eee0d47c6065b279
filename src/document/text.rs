//! Character-offset text helpers shared by structuring and context assembly.
//!
//! Every position in this crate is a character (Unicode scalar) offset, so
//! slicing goes through these helpers instead of raw byte ranges.

use once_cell::sync::Lazy;
use regex::Regex;

/// Suffix appended by [`trim_text`] when it cuts a string
pub const ELLIPSIS: &str = "...";

static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t\r]*\n").expect("paragraph regex is valid"));

/// Number of characters in `text`
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Truncate `text` to at most `max_chars` characters.
///
/// Text that already fits is returned unchanged. Otherwise the result is
/// exactly `max_chars` long: the first `max_chars - 3` characters followed by
/// `"..."`.
pub fn trim_text(text: &str, max_chars: usize) -> String {
    if char_len(text) <= max_chars {
        return text.to_string();
    }
    if max_chars < ELLIPSIS.len() {
        return ELLIPSIS[..max_chars].to_string();
    }
    let mut out: String = text.chars().take(max_chars - ELLIPSIS.len()).collect();
    out.push_str(ELLIPSIS);
    out
}

/// Byte index of the character at `char_idx`, or `text.len()` past the end
fn byte_index(text: &str, char_idx: usize) -> usize {
    text.char_indices()
        .nth(char_idx)
        .map(|(byte, _)| byte)
        .unwrap_or(text.len())
}

/// Slice `text` by character offsets `[start, end)`, clamped to the text
pub fn slice_chars(text: &str, start: usize, end: usize) -> &str {
    if start >= end {
        return "";
    }
    let start_byte = byte_index(text, start);
    let end_byte = byte_index(text, end);
    &text[start_byte..end_byte.max(start_byte)]
}

/// Whitespace-delimited word count
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Split text into paragraphs on blank lines, dropping empty ones
pub fn paragraphs(text: &str) -> Vec<&str> {
    PARAGRAPH_BREAK
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Collapse runs of whitespace into single spaces
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
