//! Structuring pipeline: extracted text in, structured [`Document`] out.

use std::path::Path;

use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::chapters::segment_chapters;
use super::concepts::{extract_concepts, ConceptConfig};
use super::extract::{extractor_for, ExtractError, ExtractedText, TextExtractor};
use super::models::{Chapter, Document, DocumentMetadata, DocumentType};
use super::summary::generate_summary;
use super::text::{char_len, count_words};
use crate::cache::{content_hash, DocumentCache};
use crate::metrics::METRICS;

/// Title of the single chapter of a placeholder document
pub const EXTRACTION_FAILED_TITLE: &str = "Extraction Failed";

/// Structuring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuringConfig {
    /// Words per page when the document has no page-offset table
    #[serde(default = "default_words_per_page")]
    pub words_per_page: usize,

    /// Generate the extractive summary at ingestion
    #[serde(default = "default_generate_summary")]
    pub generate_summary: bool,

    #[serde(default)]
    pub concepts: ConceptConfig,
}

fn default_words_per_page() -> usize {
    250
}

fn default_generate_summary() -> bool {
    true
}

impl Default for StructuringConfig {
    fn default() -> Self {
        Self {
            words_per_page: default_words_per_page(),
            generate_summary: default_generate_summary(),
            concepts: ConceptConfig::default(),
        }
    }
}

/// Page-offset tables must start at 0, never decrease and end at the
/// content length.
pub fn valid_page_offsets(offsets: &[usize], content_len: usize) -> bool {
    offsets.len() >= 2
        && offsets[0] == 0
        && offsets.windows(2).all(|w| w[0] <= w[1])
        && offsets.last() == Some(&content_len)
}

/// Filename without directories or extension
pub fn title_from_filename(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or(filename)
        .to_string()
}

/// Turns extracted text into documents
#[derive(Debug, Clone, Default)]
pub struct StructuringPipeline {
    config: StructuringConfig,
}

impl StructuringPipeline {
    pub fn new(config: StructuringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StructuringConfig {
        &self.config
    }

    /// Structure already-extracted text.
    ///
    /// Page offsets reported by the extractor take precedence over those in
    /// `metadata`. A table that does not describe the content is dropped.
    pub fn structure(
        &self,
        title: impl Into<String>,
        doc_type: DocumentType,
        extracted: ExtractedText,
        mut metadata: DocumentMetadata,
    ) -> Document {
        let ExtractedText { text: content, page_offsets } = extracted;
        let content_len = char_len(&content);

        if page_offsets.is_some() {
            metadata.page_offsets = page_offsets;
        }
        if let Some(offsets) = metadata.page_offsets.as_deref() {
            if !valid_page_offsets(offsets, content_len) {
                warn!(
                    "Dropping page-offset table with {} entries: does not match {} chars of content",
                    offsets.len(),
                    content_len
                );
                metadata.page_offsets = None;
            }
        }

        let offsets = metadata.page_offsets();
        let chapters = segment_chapters(&content, offsets);
        let concepts = extract_concepts(&content, &self.config.concepts);
        let total_words = count_words(&content);
        let total_pages = match offsets {
            Some(offsets) => (offsets.len() - 1) as u32,
            None => self.estimate_pages(total_words),
        };
        let summary = if self.config.generate_summary {
            generate_summary(&content, &chapters, &metadata)
        } else {
            None
        };

        debug!(
            "Structured {} words into {} chapters, {} concepts, {} pages",
            total_words,
            chapters.len(),
            concepts.len(),
            total_pages
        );
        METRICS.record_document_structured(doc_type.as_str());

        Document {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            content,
            doc_type,
            total_words,
            total_pages,
            chapters,
            concepts,
            metadata,
            summary,
            created_at: Utc::now(),
            payload: None,
        }
    }

    fn estimate_pages(&self, total_words: usize) -> u32 {
        let per_page = self.config.words_per_page.max(1);
        (total_words.div_ceil(per_page)).max(1) as u32
    }

    /// Extract and structure an upload. Extraction failures yield a
    /// placeholder document instead of an error.
    pub fn ingest(&self, filename: &str, bytes: Bytes, extractor: &dyn TextExtractor) -> Document {
        let doc_type = DocumentType::from_filename(filename);
        match self.try_ingest(filename, &bytes, extractor) {
            Ok(document) => document.with_payload(bytes),
            Err(e) => self.placeholder(filename, doc_type, &e).with_payload(bytes),
        }
    }

    /// Like [`ingest`](Self::ingest), choosing the built-in extractor for the
    /// filename's type.
    pub fn ingest_auto(&self, filename: &str, bytes: Bytes) -> Document {
        let doc_type = DocumentType::from_filename(filename);
        match extractor_for(doc_type) {
            Some(extractor) => self.ingest(filename, bytes, extractor.as_ref()),
            None => {
                let err = ExtractError::Unsupported(doc_type.as_str().to_string());
                self.placeholder(filename, doc_type, &err).with_payload(bytes)
            }
        }
    }

    /// Ingest through a content-addressed cache. Hits get the payload
    /// re-attached and take their title from `filename`; placeholders are
    /// never cached.
    pub async fn ingest_cached(
        &self,
        filename: &str,
        bytes: Bytes,
        extractor: &dyn TextExtractor,
        cache: &dyn DocumentCache,
    ) -> Document {
        let hash = content_hash(&bytes);
        if let Some(mut document) = cache.get(&hash).await {
            debug!("Document cache hit for {}", filename);
            document.title = title_from_filename(filename);
            return document.with_payload(bytes);
        }

        let doc_type = DocumentType::from_filename(filename);
        match self.try_ingest(filename, &bytes, extractor) {
            Ok(document) => {
                cache.put(hash, document.clone()).await;
                document.with_payload(bytes)
            }
            Err(e) => self.placeholder(filename, doc_type, &e).with_payload(bytes),
        }
    }

    fn try_ingest(
        &self,
        filename: &str,
        bytes: &[u8],
        extractor: &dyn TextExtractor,
    ) -> Result<Document, ExtractError> {
        let doc_type = DocumentType::from_filename(filename);
        let extracted = extractor.extract(bytes)?;
        let document = self.structure(
            title_from_filename(filename),
            doc_type,
            extracted,
            DocumentMetadata::default(),
        );
        info!(
            "Ingested {} via {} extractor: {} words, {} chapters",
            filename,
            extractor.name(),
            document.total_words,
            document.chapters.len()
        );
        Ok(document)
    }

    /// Document standing in for an upload whose text could not be extracted
    fn placeholder(&self, filename: &str, doc_type: DocumentType, err: &ExtractError) -> Document {
        warn!("Text extraction failed for {}: {}", filename, err);
        METRICS.record_extraction_failure(doc_type.as_str());

        let content = format!(
            "The text of \"{filename}\" could not be extracted ({err}). \
             Try re-uploading the file or converting it to plain text."
        );
        let len = char_len(&content);
        let total_words = count_words(&content);

        Document {
            id: Uuid::new_v4().to_string(),
            title: title_from_filename(filename),
            chapters: vec![Chapter {
                title: EXTRACTION_FAILED_TITLE.to_string(),
                start_position: 0,
                end_position: len,
                page_start: None,
                page_end: None,
                word_count: total_words,
            }],
            content,
            doc_type,
            total_words,
            total_pages: 1,
            concepts: Vec::new(),
            metadata: DocumentMetadata::default(),
            summary: None,
            created_at: Utc::now(),
            payload: None,
        }
    }
}
