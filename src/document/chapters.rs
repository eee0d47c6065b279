//! Heuristic chapter segmentation.
//!
//! Markers are recognized purely by line shape: a line under 100 characters
//! that starts with "chapter" (any case) or with a leading number followed by
//! a dot or whitespace. False positives ("2024 was a good year") and misses
//! are a known limitation; page-to-chapter mapping relies on this exact rule.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::models::Chapter;
use super::text::{char_len, count_words, slice_chars};
use crate::context::pages::page_for_offset;

/// Title used when no marker is found
pub const FULL_DOCUMENT_TITLE: &str = "Full Document";

/// Marker lines must be shorter than this
pub const MAX_MARKER_LINE_CHARS: usize = 100;

static NUMERIC_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(\.|\s)").expect("numeric marker regex is valid"));

/// Whether a line looks like a chapter heading
pub fn is_chapter_marker(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() || char_len(trimmed) >= MAX_MARKER_LINE_CHARS {
        return false;
    }
    let starts_with_chapter = trimmed
        .get(..7)
        .map(|prefix| prefix.eq_ignore_ascii_case("chapter"))
        .unwrap_or(false);
    starts_with_chapter || NUMERIC_MARKER.is_match(trimmed)
}

/// Partition `content` into chapters.
///
/// The result always covers `[0, len)` contiguously: text before the first
/// marker belongs to the first chapter and the last chapter always ends at
/// the content length. Consecutive markers each open their own chapter.
pub fn segment_chapters(content: &str, page_offsets: Option<&[usize]>) -> Vec<Chapter> {
    let total = char_len(content);
    let mut chapters = Vec::new();
    let mut open: Option<(String, usize)> = None;
    let mut offset = 0usize;

    for line in content.split('\n') {
        if is_chapter_marker(line) {
            let start = match open.take() {
                Some((title, start)) => {
                    chapters.push(make_chapter(content, title, start, offset, page_offsets));
                    offset
                }
                None => 0,
            };
            open = Some((line.trim().to_string(), start));
        }
        offset += char_len(line) + 1;
    }

    match open {
        Some((title, start)) => {
            chapters.push(make_chapter(content, title, start, total, page_offsets));
        }
        None => {
            chapters.push(make_chapter(
                content,
                FULL_DOCUMENT_TITLE.to_string(),
                0,
                total,
                page_offsets,
            ));
        }
    }

    debug!("Segmented {} chars into {} chapters", total, chapters.len());
    chapters
}

fn make_chapter(
    content: &str,
    title: String,
    start: usize,
    end: usize,
    page_offsets: Option<&[usize]>,
) -> Chapter {
    let (page_start, page_end) = match page_offsets {
        Some(offsets) => {
            let last_char = end.saturating_sub(1).max(start);
            (
                Some(page_for_offset(offsets, start)),
                Some(page_for_offset(offsets, last_char)),
            )
        }
        None => (None, None),
    };

    Chapter {
        title,
        start_position: start,
        end_position: end,
        page_start,
        page_end,
        word_count: count_words(slice_chars(content, start, end)),
    }
}
