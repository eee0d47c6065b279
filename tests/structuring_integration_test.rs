//! Integration tests for structuring and context assembly

use bytes::Bytes;
use study_buddy::context::clamp_page;
use study_buddy::document::text::{char_len, slice_chars, trim_text};
use study_buddy::document::{PlainTextExtractor, EXTRACTION_FAILED_TITLE, FULL_DOCUMENT_TITLE};
use study_buddy::{
    ContextBuilder, ContextRequest, DocumentMetadata, DocumentType, ExtractedText,
    MokaDocumentCache, StructuringPipeline,
};

fn paged_document(pages: usize, chars_per_page: usize) -> study_buddy::Document {
    let content: String = (0..pages)
        .map(|i| {
            let word = format!("page{:02}xxx ", i + 1);
            word.repeat(chars_per_page / word.len())
        })
        .collect();
    let offsets = (0..=pages).map(|i| i * chars_per_page).collect();
    StructuringPipeline::default().structure(
        "paged",
        DocumentType::Pdf,
        ExtractedText::new(content),
        DocumentMetadata::default().with_page_offsets(offsets),
    )
}

#[test]
fn test_chapters_partition_content() {
    let text = "Preface\nChapter 1\nalpha beta\n2. Second\ngamma\nCHAPTER THREE\ndelta";
    let doc = StructuringPipeline::default().structure(
        "book",
        DocumentType::Txt,
        ExtractedText::new(text),
        DocumentMetadata::default(),
    );

    assert_eq!(doc.chapters.len(), 3);
    assert_eq!(doc.chapters[0].start_position, 0);
    for pair in doc.chapters.windows(2) {
        assert_eq!(pair[0].end_position, pair[1].start_position);
    }
    assert_eq!(doc.chapters.last().unwrap().end_position, char_len(text));
    let titles: Vec<&str> = doc.chapters.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["Chapter 1", "2. Second", "CHAPTER THREE"]);
}

#[test]
fn test_unstructured_text_is_one_chapter() {
    let doc = StructuringPipeline::default().ingest_auto(
        "notes.txt",
        Bytes::from_static(b"No headings anywhere in this text."),
    );
    assert_eq!(doc.chapters.len(), 1);
    assert_eq!(doc.chapters[0].title, FULL_DOCUMENT_TITLE);
}

#[test]
fn test_concept_importance_is_bounded() {
    let text = "membrane ".repeat(60) + &"protein ".repeat(5) + &"lipid ".repeat(3);
    let doc = StructuringPipeline::default().structure(
        "cells",
        DocumentType::Txt,
        ExtractedText::new(text),
        DocumentMetadata::default(),
    );
    assert_eq!(doc.concepts[0].term, "membrane");
    assert_eq!(doc.concepts[0].importance, 10);
    assert!(doc.concepts.iter().all(|c| (1..=10).contains(&c.importance)));
    assert!(doc.concepts.iter().all(|c| c.related_concepts.is_empty()));
}

#[test]
fn test_ten_page_visible_window() {
    let doc = paged_document(10, 100);
    assert_eq!(doc.total_pages, 10);

    let context = ContextBuilder::default()
        .build_context(&ContextRequest::new(Some(&doc)).with_page(5.0));

    let window = slice_chars(&doc.content, 300, 600).trim();
    assert!(window.starts_with("page04xxx"));
    assert!(window.ends_with("page06xxx"));
    assert!(context.contains(&format!("Visible context (pages 4-6):\n{window}\n\n")));
}

#[test]
fn test_page_clamping_examples() {
    assert_eq!(clamp_page(0.0, 10), 1);
    assert_eq!(clamp_page(999.0, 10), 10);
    assert_eq!(clamp_page(f64::NAN, 10), 1);
}

#[test]
fn test_trim_text_contract() {
    let text = "x".repeat(50);
    assert_eq!(trim_text(&text, 50), text);
    let cut = trim_text(&text, 20);
    assert_eq!(char_len(&cut), 20);
    assert!(cut.ends_with("..."));
}

#[test]
fn test_extended_context_synopsis_lines() {
    let body = "Long explanatory sentence about the topic at hand. ".repeat(20);
    let text = format!("Chapter 1\n{body}\n\nChapter 2\n{body}\n\nChapter 3\n{body}");
    let doc = StructuringPipeline::default().structure(
        "course",
        DocumentType::Txt,
        ExtractedText::new(text),
        DocumentMetadata::default(),
    );
    let context = ContextBuilder::default()
        .build_context(&ContextRequest::new(Some(&doc)).extended(true));

    let synopsis_lines: Vec<&str> = context.lines().filter(|l| l.starts_with("• ")).collect();
    assert_eq!(synopsis_lines.len(), doc.summary.as_ref().unwrap().sections.len());
    for line in synopsis_lines {
        let (_, synopsis) = line.split_once(": ").unwrap();
        assert!(char_len(synopsis) <= 160);
    }
}

#[test]
fn test_context_is_deterministic_and_summary_idempotent() {
    let doc = paged_document(6, 120);
    let builder = ContextBuilder::default();
    let request = ContextRequest::new(Some(&doc))
        .with_page(3.0)
        .with_selection("page03x")
        .extended(true);
    assert_eq!(builder.build_context(&request), builder.build_context(&request));

    let again = study_buddy::document::generate_summary(&doc.content, &doc.chapters, &doc.metadata);
    assert_eq!(again, doc.summary);
}

#[test]
fn test_cached_ingestion_round_trip() {
    tokio_test::block_on(async {
        let pipeline = StructuringPipeline::default();
        let cache = MokaDocumentCache::new(4, std::time::Duration::from_secs(60));
        let bytes = Bytes::from_static(b"Chapter 1\nCached once, served twice.");

        let first = pipeline
            .ingest_cached("c.txt", bytes.clone(), &PlainTextExtractor, &cache)
            .await;
        let second = pipeline
            .ingest_cached("c.txt", bytes, &PlainTextExtractor, &cache)
            .await;

        assert_eq!(first.id, second.id);
        assert!(second.has_payload());
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    });
}

#[test]
fn test_unsupported_format_becomes_placeholder() {
    let doc = StructuringPipeline::default()
        .ingest_auto("scan.pdf", Bytes::from_static(b"%PDF-1.4 binary"));
    assert_eq!(doc.doc_type, DocumentType::Pdf);
    assert_eq!(doc.chapters[0].title, EXTRACTION_FAILED_TITLE);
    assert!(doc.summary.is_none());

    let context = ContextBuilder::default().build_context(&ContextRequest::new(Some(&doc)));
    assert!(context.contains("could not be extracted"));
}
