//! Append-only conversation history

use std::sync::{PoisonError, RwLock};

use super::models::AIResponse;

/// Ordered record of exchanges; entries are never edited or removed
#[derive(Debug, Default)]
pub struct ConversationHistory {
    entries: RwLock<Vec<AIResponse>>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: AIResponse) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(response);
    }

    /// Copy of every entry in order
    pub fn snapshot(&self) -> Vec<AIResponse> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last(&self) -> Option<AIResponse> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
