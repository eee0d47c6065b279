//! Bounded, deterministic context assembly.
//!
//! The context is a fixed sequence of labelled segments, each capped by its
//! own character budget and omitted when empty:
//!
//! 1. header (title, subject, key terms, current page)
//! 2. visible context around the current page
//! 3. focused (selected) text
//! 4. chapter context from the current page onward
//! 5. chapter synopses or a document preview, when extended
//! 6. related references from the previous exchange
//! 7. additional caller-supplied context
//!
//! Building is a pure function of the request and the budgets.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::pages::{chapter_at_offset, chapter_for_page, clamp_page, page_count, page_span};
use crate::assistant::models::Reference;
use crate::document::text::{char_len, collapse_whitespace, slice_chars, trim_text};
use crate::document::Document;
use crate::metrics::METRICS;

const SEGMENT_SEPARATOR: &str = "\n\n";

/// Character budgets for each segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextBudgets {
    #[serde(default = "default_visible_chars")]
    pub visible_chars: usize,
    #[serde(default = "default_chapter_chars")]
    pub chapter_chars: usize,
    #[serde(default = "default_extended_chapter_chars")]
    pub extended_chapter_chars: usize,
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
    #[serde(default = "default_synopsis_line_chars")]
    pub synopsis_line_chars: usize,
    #[serde(default = "default_selected_chars")]
    pub selected_chars: usize,
    #[serde(default = "default_reference_chars")]
    pub reference_chars: usize,
    #[serde(default = "default_max_references")]
    pub max_references: usize,
    #[serde(default = "default_extra_chars")]
    pub extra_chars: usize,
    #[serde(default = "default_header_keywords")]
    pub header_keywords: usize,
    /// Leading slice used when there is no page and no summary
    #[serde(default = "default_fallback_chars")]
    pub fallback_chars: usize,
}

fn default_visible_chars() -> usize {
    900
}

fn default_chapter_chars() -> usize {
    600
}

fn default_extended_chapter_chars() -> usize {
    1400
}

fn default_preview_chars() -> usize {
    2000
}

fn default_synopsis_line_chars() -> usize {
    160
}

fn default_selected_chars() -> usize {
    1200
}

fn default_reference_chars() -> usize {
    240
}

fn default_max_references() -> usize {
    3
}

fn default_extra_chars() -> usize {
    1200
}

fn default_header_keywords() -> usize {
    8
}

fn default_fallback_chars() -> usize {
    900
}

impl Default for ContextBudgets {
    fn default() -> Self {
        Self {
            visible_chars: default_visible_chars(),
            chapter_chars: default_chapter_chars(),
            extended_chapter_chars: default_extended_chapter_chars(),
            preview_chars: default_preview_chars(),
            synopsis_line_chars: default_synopsis_line_chars(),
            selected_chars: default_selected_chars(),
            reference_chars: default_reference_chars(),
            max_references: default_max_references(),
            extra_chars: default_extra_chars(),
            header_keywords: default_header_keywords(),
            fallback_chars: default_fallback_chars(),
        }
    }
}

impl ContextBudgets {
    /// Names of budgets that are zero
    pub fn zero_budgets(&self) -> Vec<&'static str> {
        [
            ("visible_chars", self.visible_chars),
            ("chapter_chars", self.chapter_chars),
            ("extended_chapter_chars", self.extended_chapter_chars),
            ("preview_chars", self.preview_chars),
            ("synopsis_line_chars", self.synopsis_line_chars),
            ("selected_chars", self.selected_chars),
            ("reference_chars", self.reference_chars),
            ("extra_chars", self.extra_chars),
            ("fallback_chars", self.fallback_chars),
        ]
        .into_iter()
        .filter(|(_, value)| *value == 0)
        .map(|(name, _)| name)
        .collect()
    }
}

/// Inputs for one context build
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextRequest<'a> {
    pub document: Option<&'a Document>,
    pub current_page: Option<f64>,
    pub selected_text: Option<&'a str>,
    pub extended_context: bool,
    pub extra_context: Option<&'a str>,
    pub prior_references: &'a [Reference],
}

impl<'a> ContextRequest<'a> {
    pub fn new(document: Option<&'a Document>) -> Self {
        Self {
            document,
            ..Self::default()
        }
    }

    pub fn with_page(mut self, page: f64) -> Self {
        self.current_page = Some(page);
        self
    }

    pub fn with_selection(mut self, text: &'a str) -> Self {
        self.selected_text = Some(text);
        self
    }

    pub fn extended(mut self, extended: bool) -> Self {
        self.extended_context = extended;
        self
    }

    pub fn with_extra_context(mut self, text: &'a str) -> Self {
        self.extra_context = Some(text);
        self
    }

    pub fn with_references(mut self, references: &'a [Reference]) -> Self {
        self.prior_references = references;
        self
    }
}

/// Assembles the context string sent alongside a query
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    budgets: ContextBudgets,
}

impl ContextBuilder {
    pub fn new(budgets: ContextBudgets) -> Self {
        Self { budgets }
    }

    pub fn budgets(&self) -> &ContextBudgets {
        &self.budgets
    }

    /// Build the context string for `request`
    pub fn build_context(&self, request: &ContextRequest<'_>) -> String {
        let page = match (request.document, request.current_page) {
            (Some(doc), Some(page)) => Some(clamp_page(page, doc.total_pages)),
            _ => None,
        };

        let segments = [
            request.document.and_then(|doc| self.header(doc, page)),
            request.document.and_then(|doc| self.visible(doc, page)),
            self.focused(request.selected_text),
            match (request.document, page) {
                (Some(doc), Some(page)) => self.chapter(doc, page, request.extended_context),
                _ => None,
            },
            match request.document {
                Some(doc) if request.extended_context => self.overview(doc),
                _ => None,
            },
            self.references(request.prior_references),
            self.additional(request.extra_context),
        ];

        let context = segments
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(SEGMENT_SEPARATOR)
            .trim()
            .to_string();

        let length = char_len(&context);
        debug!("Built context of {} chars", length);
        METRICS.record_context(length);
        context
    }

    fn header(&self, doc: &Document, page: Option<u32>) -> Option<String> {
        let mut lines = vec![format!("Document: {}", doc.title)];
        if let Some(subject) = doc.metadata.subject() {
            lines.push(format!("Subject: {subject}"));
        }

        let keywords: Vec<&str> = match doc.summary.as_ref().filter(|s| !s.keywords.is_empty()) {
            Some(summary) => summary.keywords.iter().map(String::as_str).collect(),
            None => doc.concepts.iter().map(|c| c.term.as_str()).collect(),
        };
        if !keywords.is_empty() {
            let shown: Vec<&str> = keywords
                .into_iter()
                .take(self.budgets.header_keywords)
                .collect();
            lines.push(format!("Key terms: {}", shown.join(", ")));
        }

        if let Some(page) = page {
            lines.push(format!("Current page: {} of {}", page, doc.total_pages.max(1)));
        }
        Some(lines.join("\n"))
    }

    fn visible(&self, doc: &Document, page: Option<u32>) -> Option<String> {
        let budget = self.budgets.visible_chars;
        let (label, text) = match (page, doc.page_offsets()) {
            (Some(page), Some(offsets)) => {
                let last_page = page_count(offsets);
                let first = page.saturating_sub(1).max(1);
                let last = (page + 1).min(last_page);
                let (start, end) = page_span(offsets, first, last)?;
                (
                    format!("Visible context (pages {first}-{last}):"),
                    slice_chars(&doc.content, start, end),
                )
            }
            (Some(page), None) => match chapter_for_page(doc, page) {
                Some((_, chapter)) => (
                    format!("Visible context (page {page}):"),
                    slice_chars(&doc.content, chapter.start_position, chapter.end_position),
                ),
                None => return self.opening(doc),
            },
            (None, _) => return self.opening(doc),
        };

        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(format!("{label}\n{}", trim_text(text, budget)))
    }

    /// Summary gist or a leading slice of the content
    fn opening(&self, doc: &Document) -> Option<String> {
        let gist = doc
            .summary
            .as_ref()
            .map(|s| s.gist.trim())
            .filter(|g| !g.is_empty());
        let text = match gist {
            Some(gist) => trim_text(gist, self.budgets.visible_chars),
            None => trim_text(doc.content.trim(), self.budgets.fallback_chars),
        };
        if text.is_empty() {
            return None;
        }
        Some(format!("Visible context:\n{text}"))
    }

    fn focused(&self, selected: Option<&str>) -> Option<String> {
        let selected = selected.map(str::trim).filter(|s| !s.is_empty())?;
        Some(format!(
            "Focused text:\n\"{}\"",
            trim_text(selected, self.budgets.selected_chars)
        ))
    }

    fn chapter(&self, doc: &Document, page: u32, extended: bool) -> Option<String> {
        let budget = if extended {
            self.budgets.extended_chapter_chars
        } else {
            self.budgets.chapter_chars
        };

        let (title, text) = match doc.page_offsets() {
            Some(offsets) => {
                let start = *offsets.get((page - 1) as usize)?;
                let (_, chapter) = chapter_at_offset(doc, start)?;
                (
                    chapter.title.as_str(),
                    slice_chars(&doc.content, start, chapter.end_position),
                )
            }
            None => {
                let (_, chapter) = chapter_for_page(doc, page)?;
                (
                    chapter.title.as_str(),
                    slice_chars(&doc.content, chapter.start_position, chapter.end_position),
                )
            }
        };

        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(format!("Chapter context ({title}):\n{}", trim_text(text, budget)))
    }

    /// Chapter synopses when a summary has sections, else a document preview
    fn overview(&self, doc: &Document) -> Option<String> {
        if let Some(summary) = doc.summary.as_ref().filter(|s| !s.sections.is_empty()) {
            let lines: Vec<String> = summary
                .sections
                .iter()
                .map(|section| {
                    let synopsis = collapse_whitespace(&section.synopsis);
                    format!(
                        "• {}: {}",
                        section.title,
                        trim_text(&synopsis, self.budgets.synopsis_line_chars)
                    )
                })
                .collect();
            return Some(format!("Chapter synopses:\n{}", lines.join("\n")));
        }

        let preview = doc.content.trim();
        if preview.is_empty() {
            return None;
        }
        Some(format!(
            "Document preview:\n{}",
            trim_text(preview, self.budgets.preview_chars)
        ))
    }

    fn references(&self, references: &[Reference]) -> Option<String> {
        let lines: Vec<String> = references
            .iter()
            .map(|r| collapse_whitespace(&r.text))
            .filter(|text| !text.is_empty())
            .take(self.budgets.max_references)
            .enumerate()
            .map(|(i, text)| {
                format!("{}. {}", i + 1, trim_text(&text, self.budgets.reference_chars))
            })
            .collect();
        if lines.is_empty() {
            return None;
        }
        Some(format!("Related references:\n{}", lines.join("\n")))
    }

    fn additional(&self, extra: Option<&str>) -> Option<String> {
        let extra = extra.map(str::trim).filter(|s| !s.is_empty())?;
        Some(format!(
            "Additional context:\n{}",
            trim_text(extra, self.budgets.extra_chars)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentMetadata, DocumentType, ExtractedText, StructuringPipeline};

    fn structure(text: &str, metadata: DocumentMetadata) -> Document {
        StructuringPipeline::default().structure(
            "biology",
            DocumentType::Txt,
            ExtractedText::new(text),
            metadata,
        )
    }

    /// Ten pages of 100 chars; page N repeats a four-letter word of the N-th letter
    fn ten_page_document() -> Document {
        let content: String = (0..10u8)
            .map(|i| format!("{} ", ((b'a' + i) as char).to_string().repeat(4)).repeat(20))
            .collect();
        let offsets = (0..=10).map(|i| i * 100).collect();
        structure(&content, DocumentMetadata::default().with_page_offsets(offsets))
    }

    #[test]
    fn test_no_document_no_inputs_is_empty() {
        let builder = ContextBuilder::default();
        assert_eq!(builder.build_context(&ContextRequest::default()), "");
    }

    #[test]
    fn test_visible_window_spans_adjacent_pages() {
        let doc = ten_page_document();
        let builder = ContextBuilder::default();
        let context = builder.build_context(&ContextRequest::new(Some(&doc)).with_page(5.0));

        let expected = slice_chars(&doc.content, 300, 600).trim();
        assert!(expected.starts_with("dddd"));
        assert!(expected.ends_with("ffff"));
        assert!(context.contains("Current page: 5 of 10"));
        assert!(context.contains(&format!("Visible context (pages 4-6):\n{expected}\n\n")));
    }

    #[test]
    fn test_page_is_clamped() {
        let doc = ten_page_document();
        let builder = ContextBuilder::default();

        let context = builder.build_context(&ContextRequest::new(Some(&doc)).with_page(999.0));
        assert!(context.contains("Current page: 10 of 10"));
        assert!(context.contains("Visible context (pages 9-10):"));

        let context = builder.build_context(&ContextRequest::new(Some(&doc)).with_page(f64::NAN));
        assert!(context.contains("Current page: 1 of 10"));
        assert!(context.contains("Visible context (pages 1-2):"));
    }

    #[test]
    fn test_chapter_context_runs_from_page_start() {
        let doc = ten_page_document();
        let builder = ContextBuilder::default();
        let context = builder.build_context(&ContextRequest::new(Some(&doc)).with_page(3.0));

        let expected = trim_text(slice_chars(&doc.content, 200, 1000).trim(), 600);
        assert!(expected.starts_with("cccc"));
        assert!(context.contains(&format!("Chapter context (Full Document):\n{expected}")));
    }

    #[test]
    fn test_two_chapter_document_without_offsets() {
        let doc = structure(
            "Chapter 1\nfoo foo foo foo\nChapter 2\nbar bar bar",
            DocumentMetadata::default(),
        );
        let builder = ContextBuilder::default();
        let context = builder.build_context(&ContextRequest::new(Some(&doc)).with_page(1.0));

        assert!(context.starts_with("Document: biology"));
        assert!(context.contains("Chapter context (Chapter 1):\nChapter 1\nfoo foo foo foo"));
    }

    #[test]
    fn test_without_page_uses_summary_gist() {
        let doc = structure("Opening paragraph.\n\nSecond one.", DocumentMetadata::default());
        let context = ContextBuilder::default().build_context(&ContextRequest::new(Some(&doc)));
        assert!(context.contains("Visible context:\nOpening paragraph. Second one."));
        assert!(!context.contains("Current page"));
        assert!(!context.contains("Chapter context"));
    }

    #[test]
    fn test_focused_text_is_quoted_and_bounded() {
        let doc = ten_page_document();
        let selection = "z".repeat(5000);
        let context = ContextBuilder::default()
            .build_context(&ContextRequest::new(Some(&doc)).with_selection(&selection));
        let quoted = format!("\"{}\"", trim_text(&selection, 1200));
        assert!(context.contains(&format!("Focused text:\n{quoted}")));
    }

    #[test]
    fn test_extended_synopsis_lines_are_bounded() {
        let long = "word ".repeat(200);
        let content = format!("Chapter 1\n{long}\n\nChapter 2\n{long}");
        let doc = structure(&content, DocumentMetadata::default());
        let context = ContextBuilder::default()
            .build_context(&ContextRequest::new(Some(&doc)).extended(true));

        let lines: Vec<&str> = context
            .lines()
            .filter(|line| line.starts_with("• "))
            .collect();
        assert_eq!(lines.len(), 2);
        for (line, title) in lines.iter().zip(["Chapter 1", "Chapter 2"]) {
            let prefix = format!("• {title}: ");
            assert!(line.starts_with(&prefix));
            assert!(char_len(&line[prefix.len()..]) <= 160);
        }
    }

    #[test]
    fn test_extended_without_summary_uses_preview() {
        let doc = ten_page_document().with_summary(None);
        let context = ContextBuilder::default()
            .build_context(&ContextRequest::new(Some(&doc)).extended(true));
        let preview = trim_text(doc.content.trim(), 2000);
        assert!(context.contains(&format!("Document preview:\n{preview}")));
    }

    #[test]
    fn test_references_and_extra_context() {
        let references = vec![
            Reference::new("First referenced sentence.", 0.4),
            Reference::new("Second referenced sentence.", 0.6),
            Reference::new("Third referenced sentence.", 0.8),
            Reference::new("Fourth is dropped.", 1.0),
        ];
        let context = ContextBuilder::default().build_context(
            &ContextRequest::new(None)
                .with_references(&references)
                .with_extra_context("  notes from the margin  "),
        );
        assert_eq!(
            context,
            "Related references:\n1. First referenced sentence.\n\
             2. Second referenced sentence.\n3. Third referenced sentence.\n\n\
             Additional context:\nnotes from the margin"
        );
    }

    #[test]
    fn test_build_is_deterministic() {
        let doc = ten_page_document();
        let builder = ContextBuilder::default();
        let request = ContextRequest::new(Some(&doc))
            .with_page(4.0)
            .with_selection("abc")
            .extended(true);
        assert_eq!(builder.build_context(&request), builder.build_context(&request));
    }

    #[test]
    fn test_custom_budgets() {
        let doc = ten_page_document();
        let budgets = ContextBudgets {
            visible_chars: 50,
            ..ContextBudgets::default()
        };
        let context = ContextBuilder::new(budgets)
            .build_context(&ContextRequest::new(Some(&doc)).with_page(5.0));
        let expected = trim_text(slice_chars(&doc.content, 300, 600).trim(), 50);
        assert!(context.contains(&format!("Visible context (pages 4-6):\n{expected}\n\n")));
    }

    #[test]
    fn test_zero_budgets_reported() {
        let budgets = ContextBudgets {
            preview_chars: 0,
            ..ContextBudgets::default()
        };
        assert_eq!(budgets.zero_budgets(), vec!["preview_chars"]);
        assert!(ContextBudgets::default().zero_budgets().is_empty());
    }
}
