//! Deterministic mode artifacts: concept maps and Socratic questions

use super::models::{ConceptEdge, ConceptMap, ConceptNode};
use crate::document::{Concept, Document};

pub const MAX_MAP_NODES: usize = 8;
pub const MAX_QUESTIONS: usize = 3;
pub const EDGE_LABEL: &str = "related to";

/// Concepts ordered by importance, then term
fn ranked_concepts(document: &Document) -> Vec<&Concept> {
    let mut concepts: Vec<&Concept> = document.concepts.iter().collect();
    concepts.sort_by(|a, b| b.importance.cmp(&a.importance).then_with(|| a.term.cmp(&b.term)));
    concepts
}

/// Top concepts as nodes, consecutive nodes linked
pub fn build_concept_map(document: &Document) -> ConceptMap {
    let nodes: Vec<ConceptNode> = ranked_concepts(document)
        .into_iter()
        .take(MAX_MAP_NODES)
        .map(|c| ConceptNode {
            term: c.term.clone(),
            importance: c.importance,
        })
        .collect();

    let edges = nodes
        .windows(2)
        .map(|pair| ConceptEdge {
            from: pair[0].term.clone(),
            to: pair[1].term.clone(),
            label: EDGE_LABEL.to_string(),
        })
        .collect();

    ConceptMap { nodes, edges }
}

/// Templated follow-up questions over the top concepts. Without concepts
/// the query itself is the subject.
pub fn socratic_questions(document: Option<&Document>, query: &str) -> Vec<String> {
    let terms: Vec<&str> = document
        .map(|doc| {
            ranked_concepts(doc)
                .into_iter()
                .take(2)
                .map(|c| c.term.as_str())
                .collect()
        })
        .unwrap_or_default();

    match terms.as_slice() {
        [first, second, ..] => vec![
            format!("How would you explain {first} in your own words?"),
            format!("Why does {second} matter in this section?"),
            format!("What connects {first} and {second}?"),
        ],
        [only] => vec![
            format!("How would you explain {only} in your own words?"),
            format!("Why does {only} matter in this section?"),
        ],
        [] => {
            let query = query.trim();
            if query.is_empty() {
                Vec::new()
            } else {
                vec![format!("How would you explain \"{query}\" in your own words?")]
            }
        }
    }
}
