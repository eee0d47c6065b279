//! Document structuring: extraction, chapters, concepts and summaries

pub mod chapters;
pub mod concepts;
pub mod extract;
pub mod models;
pub mod pipeline;
pub mod summary;
pub mod text;

pub use chapters::{is_chapter_marker, segment_chapters, FULL_DOCUMENT_TITLE};
pub use concepts::{extract_concepts, importance_for_frequency, ConceptConfig};
pub use extract::{
    extractor_for, DocxExtractor, EpubExtractor, ExtractError, ExtractedText, PlainTextExtractor,
    TextExtractor,
};
pub use models::{
    Chapter, ChapterSummary, Concept, Document, DocumentMetadata, DocumentSummary, DocumentType,
};
pub use pipeline::{StructuringConfig, StructuringPipeline, EXTRACTION_FAILED_TITLE};
pub use summary::{extract_keywords, generate_summary};
pub use text::{char_len, slice_chars, trim_text};
