//! Data models for assistant exchanges

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prompt mode for a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssistantMode {
    #[default]
    Chat,
    Question,
    Summary,
    Explanation,
    Quiz,
    Concept,
    /// Unrecognized modes; the query is sent verbatim
    Other,
}

impl AssistantMode {
    /// Case-insensitive parse; unknown names map to [`AssistantMode::Other`]
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "chat" => AssistantMode::Chat,
            "question" => AssistantMode::Question,
            "summary" => AssistantMode::Summary,
            "explanation" => AssistantMode::Explanation,
            "quiz" => AssistantMode::Quiz,
            "concept" => AssistantMode::Concept,
            _ => AssistantMode::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssistantMode::Chat => "chat",
            AssistantMode::Question => "question",
            AssistantMode::Summary => "summary",
            AssistantMode::Explanation => "explanation",
            AssistantMode::Quiz => "quiz",
            AssistantMode::Concept => "concept",
            AssistantMode::Other => "other",
        }
    }
}

impl From<&str> for AssistantMode {
    fn from(name: &str) -> Self {
        Self::parse(name)
    }
}

impl std::fmt::Display for AssistantMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A passage of context offered as supporting evidence.
///
/// Confidence is a positional heuristic, not a relevance ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub text: String,
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Reference {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptNode {
    pub term: String,
    pub importance: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptEdge {
    pub from: String,
    pub to: String,
    pub label: String,
}

/// Concept graph attached to concept-mode responses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConceptMap {
    pub nodes: Vec<ConceptNode>,
    pub edges: Vec<ConceptEdge>,
}

impl ConceptMap {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// One query/response exchange. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AIResponse {
    pub id: String,
    pub mode: AssistantMode,
    pub query: String,
    pub response: String,
    /// Context string actually sent with the query
    pub context: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub references: Vec<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concept_map: Option<ConceptMap>,
    #[serde(default)]
    pub socratic_questions: Vec<String>,
    /// Response was synthesized locally after a completion failure
    #[serde(default)]
    pub is_fallback: bool,
    #[serde(default)]
    pub estimated_prompt_tokens: usize,
}
