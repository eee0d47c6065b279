//! Page arithmetic: clamping, page-offset lookups and page-to-chapter mapping

use crate::document::{Chapter, Document};

/// Clamp a requested page into `[1, total_pages]`.
///
/// Non-finite and non-positive requests map to page 1. A document always has
/// at least one page.
pub fn clamp_page(page: f64, total_pages: u32) -> u32 {
    let total = total_pages.max(1);
    if !page.is_finite() || page < 1.0 {
        return 1;
    }
    let floored = page.floor();
    if floored >= f64::from(total) {
        total
    } else {
        floored as u32
    }
}

/// Number of pages described by a page-offset table
pub fn page_count(offsets: &[usize]) -> u32 {
    offsets.len().saturating_sub(1) as u32
}

/// 1-based page containing the character at `position`
pub fn page_for_offset(offsets: &[usize], position: usize) -> u32 {
    let starts = &offsets[..offsets.len().saturating_sub(1)];
    let page = starts.partition_point(|&start| start <= position) as u32;
    page.clamp(1, page_count(offsets).max(1))
}

/// Character range `[start, end)` covered by pages `first..=last`
pub fn page_span(offsets: &[usize], first: u32, last: u32) -> Option<(usize, usize)> {
    let pages = page_count(offsets);
    if pages == 0 || first == 0 || first > last || last > pages {
        return None;
    }
    let start = offsets[(first - 1) as usize];
    let end = offsets[last as usize];
    Some((start, end.max(start)))
}

/// Approximate page bounds of a chapter by linear interpolation over the
/// content length. Only used when the chapter has no explicit page bounds.
pub fn approximate_chapter_pages(
    chapter: &Chapter,
    content_len: usize,
    total_pages: u32,
) -> (u32, u32) {
    if content_len == 0 {
        return (1, 1);
    }
    let total = f64::from(total_pages.max(1));
    let len = content_len as f64;
    let start = (chapter.start_position as f64 / len * total).floor() as u32;
    let end = (chapter.end_position as f64 / len * total).ceil() as u32;
    (start, end)
}

/// Whether `page` falls inside `chapter`
pub fn chapter_contains_page(
    chapter: &Chapter,
    page: u32,
    content_len: usize,
    total_pages: u32,
) -> bool {
    match (chapter.page_start, chapter.page_end) {
        (Some(start), Some(end)) => start <= page && page <= end,
        _ => {
            let (start, end) = approximate_chapter_pages(chapter, content_len, total_pages);
            start <= page && page <= end
        }
    }
}

/// First chapter that contains `page`, with its index
pub fn chapter_for_page(document: &Document, page: u32) -> Option<(usize, &Chapter)> {
    let content_len = document.content_len();
    document
        .chapters
        .iter()
        .enumerate()
        .find(|(_, chapter)| {
            chapter_contains_page(chapter, page, content_len, document.total_pages)
        })
}

/// Chapter whose span contains the character at `position`
pub fn chapter_at_offset(document: &Document, position: usize) -> Option<(usize, &Chapter)> {
    document
        .chapters
        .iter()
        .enumerate()
        .find(|(_, ch)| ch.start_position <= position && position < ch.end_position)
}
