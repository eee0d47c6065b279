//! Frequency-based concept extraction

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::models::Concept;
use super::text::{char_len, slice_chars};

static WORD_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[a-z0-9']+").expect("word token regex is valid"));

/// Configuration for concept extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptConfig {
    /// Tokens must be longer than this many characters
    #[serde(default = "default_min_token_len")]
    pub min_token_len: usize,
    /// Candidates considered after ranking
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    /// Terms must occur more often than this
    #[serde(default = "default_min_frequency")]
    pub min_frequency: usize,
    /// Characters on each side of the first mention
    #[serde(default = "default_context_radius")]
    pub context_radius: usize,
}

fn default_min_token_len() -> usize {
    3
}

fn default_max_candidates() -> usize {
    50
}

fn default_min_frequency() -> usize {
    2
}

fn default_context_radius() -> usize {
    100
}

impl Default for ConceptConfig {
    fn default() -> Self {
        Self {
            min_token_len: default_min_token_len(),
            max_candidates: default_max_candidates(),
            min_frequency: default_min_frequency(),
            context_radius: default_context_radius(),
        }
    }
}

/// Importance score for a term frequency: `clamp(floor(freq / 2), 1, 10)`
pub fn importance_for_frequency(frequency: usize) -> u8 {
    (frequency / 2).clamp(1, 10) as u8
}

struct TermStats {
    frequency: usize,
    first_mention: usize,
}

/// Extract candidate key terms from `content`.
///
/// Terms are ranked by frequency (ties broken alphabetically), cut to the top
/// candidates and then filtered by the minimum frequency. No relations are
/// extracted.
pub fn extract_concepts(content: &str, config: &ConceptConfig) -> Vec<Concept> {
    let mut stats: HashMap<String, TermStats> = HashMap::new();

    // Track the char offset of each match incrementally.
    let mut last_byte = 0usize;
    let mut last_char = 0usize;
    for m in WORD_TOKEN.find_iter(content) {
        last_char += char_len(&content[last_byte..m.start()]);
        last_byte = m.start();

        let term = m.as_str().to_lowercase();
        if char_len(&term) <= config.min_token_len {
            continue;
        }
        stats
            .entry(term)
            .and_modify(|s| s.frequency += 1)
            .or_insert(TermStats {
                frequency: 1,
                first_mention: last_char,
            });
    }

    let mut ranked: Vec<(String, TermStats)> = stats.into_iter().collect();
    ranked.sort_by(|(a_term, a), (b_term, b)| {
        b.frequency.cmp(&a.frequency).then_with(|| a_term.cmp(b_term))
    });
    ranked.truncate(config.max_candidates);

    let total = char_len(content);
    let concepts: Vec<Concept> = ranked
        .into_iter()
        .filter(|(_, s)| s.frequency > config.min_frequency)
        .map(|(term, s)| {
            let start = s.first_mention.saturating_sub(config.context_radius);
            let end = (s.first_mention + char_len(&term) + config.context_radius).min(total);
            Concept {
                importance: importance_for_frequency(s.frequency),
                context: slice_chars(content, start, end).trim().to_string(),
                term,
                frequency: s.frequency,
                first_mention: s.first_mention,
                related_concepts: Vec::new(),
            }
        })
        .collect();

    debug!("Extracted {} concepts", concepts.len());
    concepts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_importance_clamped_and_monotonic() {
        let mut previous = 0;
        for freq in 0..100 {
            let importance = importance_for_frequency(freq);
            assert!((1..=10).contains(&importance));
            assert!(importance >= previous);
            previous = importance;
        }
        assert_eq!(importance_for_frequency(3), 1);
        assert_eq!(importance_for_frequency(9), 4);
        assert_eq!(importance_for_frequency(40), 10);
    }

    #[test]
    fn test_extracts_frequent_long_terms() {
        let content = "Photosynthesis converts light. Photosynthesis needs water. \
                       Photosynthesis happens in leaves. The the the the cat cat cat cat.";
        let concepts = extract_concepts(content, &ConceptConfig::default());

        assert_eq!(concepts.len(), 1);
        let concept = &concepts[0];
        assert_eq!(concept.term, "photosynthesis");
        assert_eq!(concept.frequency, 3);
        assert_eq!(concept.importance, 1);
        assert_eq!(concept.first_mention, 0);
        assert!(concept.related_concepts.is_empty());
    }

    #[test]
    fn test_first_mention_is_character_offset() {
        let content = "éé alpha beta gamma. Enzyme enzyme ENZYME works.";
        let concepts = extract_concepts(content, &ConceptConfig::default());
        let enzyme = concepts.iter().find(|c| c.term == "enzyme").unwrap();
        assert_eq!(enzyme.first_mention, 21);
        assert_eq!(slice_chars(content, 21, 27), "Enzyme");
    }

    #[test]
    fn test_context_window_is_bounded() {
        let filler = "x".repeat(300);
        let content = format!("{filler} mitochondria mitochondria mitochondria {filler}");
        let concepts = extract_concepts(&content, &ConceptConfig::default());
        let concept = &concepts[0];
        assert!(char_len(&concept.context) <= 100 + "mitochondria".len() + 100);
        assert!(concept.context.contains("mitochondria"));
    }

    #[test]
    fn test_ranking_is_deterministic() {
        let content = "delta delta delta alpha alpha alpha gamma gamma gamma gamma";
        let first = extract_concepts(content, &ConceptConfig::default());
        let second = extract_concepts(content, &ConceptConfig::default());
        assert_eq!(first, second);
        let terms: Vec<_> = first.iter().map(|c| c.term.as_str()).collect();
        assert_eq!(terms, vec!["gamma", "alpha", "delta"]);
    }

    #[test]
    fn test_empty_content() {
        assert!(extract_concepts("", &ConceptConfig::default()).is_empty());
    }
}
