//! Deterministic extractive summaries.
//!
//! Summaries are cache artifacts: regenerable at any time from the content,
//! chapters and metadata, and identical across calls on the same input.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use super::models::{Chapter, ChapterSummary, DocumentMetadata, DocumentSummary};
use super::text::{paragraphs, slice_chars, trim_text};

pub const GIST_PARAGRAPHS: usize = 3;
pub const GIST_MAX_CHARS: usize = 600;
pub const SYNOPSIS_PARAGRAPHS: usize = 2;
pub const SYNOPSIS_MAX_CHARS: usize = 400;
pub const DOCUMENT_KEYWORDS: usize = 12;
pub const CHAPTER_KEYWORDS: usize = 6;

static ALPHA_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z]+").expect("alphabetic token regex is valid"));

const STOP_WORDS: &[&str] = &[
    "about", "above", "after", "again", "against", "also", "because", "been", "before",
    "being", "below", "between", "both", "could", "does", "doing", "down", "during", "each",
    "from", "further", "have", "having", "here", "hers", "herself", "himself", "into",
    "itself", "just", "more", "most", "myself", "once", "only", "other", "ours", "ourselves",
    "over", "same", "should", "some", "such", "than", "that", "their", "theirs", "them",
    "themselves", "then", "there", "these", "they", "this", "those", "through", "under",
    "until", "very", "were", "what", "when", "where", "which", "while", "will", "with",
    "would", "your", "yours", "yourself", "yourselves", "upon", "like", "many", "much",
    "must", "within", "without", "among", "another", "every", "however", "therefore",
];

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Top `limit` keywords: alphabetic tokens longer than 3 characters, stop
/// words removed, ranked by frequency with an alphabetical tie-break.
pub fn extract_keywords(text: &str, limit: usize) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for m in ALPHA_TOKEN.find_iter(text) {
        let word = m.as_str().to_ascii_lowercase();
        if word.len() <= 3 || is_stop_word(&word) {
            continue;
        }
        *counts.entry(word).or_insert(0) += 1;
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|(a, a_count), (b, b_count)| b_count.cmp(a_count).then_with(|| a.cmp(b)));
    ranked.into_iter().take(limit).map(|(word, _)| word).collect()
}

/// Join the first `count` paragraphs and trim to `max_chars`
fn leading_paragraphs(text: &str, count: usize, max_chars: usize) -> String {
    let joined = paragraphs(text)
        .into_iter()
        .take(count)
        .collect::<Vec<_>>()
        .join(" ");
    trim_text(&joined, max_chars)
}

/// Synopsis of one chapter, or `None` when the span has no text
pub fn summarize_chapter(content: &str, index: usize, chapter: &Chapter) -> Option<ChapterSummary> {
    let span = slice_chars(content, chapter.start_position, chapter.end_position);
    let synopsis = leading_paragraphs(span, SYNOPSIS_PARAGRAPHS, SYNOPSIS_MAX_CHARS);
    if synopsis.is_empty() {
        return None;
    }
    Some(ChapterSummary {
        chapter_index: index,
        title: chapter.title.clone(),
        synopsis,
        keywords: extract_keywords(span, CHAPTER_KEYWORDS),
    })
}

/// Generate a document summary. Blank content yields no summary.
pub fn generate_summary(
    content: &str,
    chapters: &[Chapter],
    metadata: &DocumentMetadata,
) -> Option<DocumentSummary> {
    if content.trim().is_empty() {
        return None;
    }

    let lead = leading_paragraphs(content, GIST_PARAGRAPHS, GIST_MAX_CHARS);
    let gist = match metadata.subject() {
        Some(subject) => format!("{subject}: {lead}"),
        None => lead,
    };

    let sections = chapters
        .iter()
        .enumerate()
        .filter_map(|(index, chapter)| summarize_chapter(content, index, chapter))
        .collect();

    Some(DocumentSummary {
        gist,
        sections,
        keywords: extract_keywords(content, DOCUMENT_KEYWORDS),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::chapters::segment_chapters;
    use crate::document::text::char_len;

    #[test]
    fn test_empty_content_has_no_summary() {
        assert!(generate_summary("", &[], &DocumentMetadata::default()).is_none());
        assert!(generate_summary("  \n\n ", &[], &DocumentMetadata::default()).is_none());
    }

    #[test]
    fn test_gist_uses_first_three_paragraphs() {
        let content = "One.\n\nTwo.\n\nThree.\n\nFour.";
        let chapters = segment_chapters(content, None);
        let summary = generate_summary(content, &chapters, &DocumentMetadata::default()).unwrap();
        assert_eq!(summary.gist, "One. Two. Three.");
    }

    #[test]
    fn test_gist_is_trimmed_and_prefixed_by_subject() {
        let content = "word ".repeat(400);
        let meta = DocumentMetadata::default().with_subject("Botany");
        let summary = generate_summary(&content, &[], &meta).unwrap();
        assert!(summary.gist.starts_with("Botany: "));
        assert!(summary.gist.ends_with("..."));
        assert_eq!(char_len(&summary.gist), "Botany: ".len() + GIST_MAX_CHARS);
    }

    #[test]
    fn test_chapter_synopses() {
        let content = "Chapter 1\nCells divide.\n\nMitosis follows.\n\nIgnored third.\nChapter 2\nGenes.";
        let chapters = segment_chapters(content, None);
        let summary = generate_summary(content, &chapters, &DocumentMetadata::default()).unwrap();

        assert_eq!(summary.sections.len(), 2);
        assert_eq!(summary.sections[0].title, "Chapter 1");
        assert_eq!(
            summary.sections[0].synopsis,
            "Chapter 1\nCells divide. Mitosis follows."
        );
        assert_eq!(summary.sections[1].chapter_index, 1);
        assert_eq!(summary.sections[1].synopsis, "Chapter 2\nGenes.");
    }

    #[test]
    fn test_keywords_skip_stop_words_and_short_tokens() {
        let text = "cell cell cell membrane membrane which which which which the the and";
        assert_eq!(extract_keywords(text, 12), vec!["cell", "membrane"]);
        assert_eq!(extract_keywords(text, 1), vec!["cell"]);
    }

    #[test]
    fn test_summary_is_idempotent() {
        let content = "Chapter 1\nEnergy flows.\n\nChapter 2\nMatter cycles through ecosystems.";
        let chapters = segment_chapters(content, None);
        let meta = DocumentMetadata::default().with_subject("Ecology");
        let first = generate_summary(content, &chapters, &meta);
        let second = generate_summary(content, &chapters, &meta);
        assert_eq!(first, second);
    }
}
