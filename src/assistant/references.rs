//! Best-effort reference extraction.
//!
//! Picks the first few substantial sentences of the context. Confidence rises
//! with position and is not a relevance score.

use super::models::Reference;
use crate::document::text::char_len;

/// Sentences must be longer than this many characters
pub const MIN_SENTENCE_CHARS: usize = 30;
pub const MAX_REFERENCES: usize = 3;

const SOURCE: &str = "context";

/// Confidence assigned to the reference at `index`
pub fn confidence_for_index(index: usize) -> f32 {
    0.4 + 0.2 * index as f32
}

pub fn extract_references(context: &str) -> Vec<Reference> {
    context
        .split(['.', '!', '?', '\n'])
        .map(str::trim)
        .filter(|sentence| char_len(sentence) > MIN_SENTENCE_CHARS)
        .take(MAX_REFERENCES)
        .enumerate()
        .map(|(i, sentence)| Reference::new(sentence, confidence_for_index(i)).with_source(SOURCE))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_sentences_are_skipped() {
        let context = "Too short. Also short!\nThe mitochondria is the powerhouse of the cell. \
                       Short? Ribosomes assemble proteins from amino acid chains.";
        let refs = extract_references(context);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].text, "The mitochondria is the powerhouse of the cell");
        assert_eq!(refs[1].text, "Ribosomes assemble proteins from amino acid chains");
    }

    #[test]
    fn test_at_most_three_with_rising_confidence() {
        let sentence = "This sentence is comfortably longer than thirty characters";
        let context = [sentence; 5].join(". ");
        let refs = extract_references(&context);
        assert_eq!(refs.len(), 3);
        let confidences: Vec<f32> = refs.iter().map(|r| r.confidence).collect();
        assert!((confidences[0] - 0.4).abs() < 1e-6);
        assert!((confidences[1] - 0.6).abs() < 1e-6);
        assert!((confidences[2] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_empty_context() {
        assert!(extract_references("").is_empty());
    }
}
