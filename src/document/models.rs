//! Data models for structured documents

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::text::{char_len, slice_chars};

/// Source format of an uploaded document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Pdf,
    Epub,
    Txt,
    Docx,
}

impl DocumentType {
    /// Infer the type from a filename extension; unknown extensions are text
    pub fn from_filename(filename: &str) -> Self {
        let ext = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => DocumentType::Pdf,
            "epub" => DocumentType::Epub,
            "docx" => DocumentType::Docx,
            _ => DocumentType::Txt,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Pdf => "pdf",
            DocumentType::Epub => "epub",
            DocumentType::Txt => "txt",
            DocumentType::Docx => "docx",
        }
    }
}

/// Optional structural hints attached to a document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Character offset of each page start plus a trailing sentinel equal to
    /// the content length. Only paginated formats carry one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_offsets: Option<Vec<usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl DocumentMetadata {
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_page_offsets(mut self, offsets: Vec<usize>) -> Self {
        self.page_offsets = Some(offsets);
        self
    }

    /// The page-offset table, if it describes at least one page
    pub fn page_offsets(&self) -> Option<&[usize]> {
        self.page_offsets
            .as_deref()
            .filter(|offsets| offsets.len() >= 2)
    }

    /// Non-blank subject
    pub fn subject(&self) -> Option<&str> {
        self.subject
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// A contiguous span of the document content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    /// Inclusive start, in characters
    pub start_position: usize,
    /// Exclusive end, in characters
    pub end_position: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_start: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_end: Option<u32>,
    pub word_count: usize,
}

impl Chapter {
    pub fn len(&self) -> usize {
        self.end_position.saturating_sub(self.start_position)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A frequency-ranked candidate key term
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub term: String,
    pub frequency: usize,
    /// 1-10, non-decreasing in `frequency`
    pub importance: u8,
    /// Character offset of the first occurrence
    pub first_mention: usize,
    /// Window of text around the first occurrence
    pub context: String,
    /// Never populated by extraction
    #[serde(default)]
    pub related_concepts: Vec<String>,
}

/// Synopsis of a single chapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterSummary {
    pub chapter_index: usize,
    pub title: String,
    pub synopsis: String,
    pub keywords: Vec<String>,
}

/// Derived, regenerable summary of a whole document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub gist: String,
    pub sections: Vec<ChapterSummary>,
    pub keywords: Vec<String>,
}

/// One uploaded file, structured
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub total_words: usize,
    pub total_pages: u32,
    pub chapters: Vec<Chapter>,
    pub concepts: Vec<Concept>,
    #[serde(default)]
    pub metadata: DocumentMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<DocumentSummary>,
    pub created_at: DateTime<Utc>,
    /// Original file bytes; never persisted
    #[serde(skip)]
    pub payload: Option<Bytes>,
}

impl Document {
    /// Content length in characters
    pub fn content_len(&self) -> usize {
        char_len(&self.content)
    }

    pub fn page_offsets(&self) -> Option<&[usize]> {
        self.metadata.page_offsets()
    }

    /// Text of the chapter at `index`
    pub fn chapter_text(&self, index: usize) -> Option<&str> {
        self.chapters
            .get(index)
            .map(|ch| slice_chars(&self.content, ch.start_position, ch.end_position))
    }

    /// Replace the derived summary
    pub fn with_summary(mut self, summary: Option<DocumentSummary>) -> Self {
        self.summary = summary;
        self
    }

    /// Re-attach the original file bytes
    pub fn with_payload(mut self, payload: Bytes) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }
}
