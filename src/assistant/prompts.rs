//! Prompt templates

use super::models::AssistantMode;

/// System message sent with every completion request
pub const SYSTEM_PROMPT: &str = "You are a patient study buddy helping a student read a document. \
Ground your answers in the provided context, say so when the context does not cover the question, \
and prefer short explanations with concrete examples.";

/// Template prefix for a mode; `None` passes the query through verbatim
pub fn mode_prefix(mode: AssistantMode) -> Option<&'static str> {
    match mode {
        AssistantMode::Chat => Some("Reply conversationally to the student: "),
        AssistantMode::Question => Some("Answer this question using the document context: "),
        AssistantMode::Summary => Some("Summarize the following for a student: "),
        AssistantMode::Explanation => {
            Some("Explain this clearly, step by step, with one example: ")
        }
        AssistantMode::Quiz => {
            Some("Write a short quiz of three questions, with answers, about: ")
        }
        AssistantMode::Concept => {
            Some("Identify the key concepts and how they relate to each other in: ")
        }
        AssistantMode::Other => None,
    }
}

/// Mode prefix followed by the query
pub fn render_prompt(mode: AssistantMode, query: &str) -> String {
    match mode_prefix(mode) {
        Some(prefix) => format!("{prefix}{query}"),
        None => query.to_string(),
    }
}

/// User message: the context block, when present, then the prompt
pub fn render_user_message(context: &str, prompt: &str) -> String {
    if context.trim().is_empty() {
        prompt.to_string()
    } else {
        format!("Context:\n{context}\n\n{prompt}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_other_mode_is_verbatim() {
        assert_eq!(render_prompt(AssistantMode::Other, "What is ATP?"), "What is ATP?");
    }

    #[test]
    fn test_known_modes_are_prefixed() {
        for mode in [
            AssistantMode::Chat,
            AssistantMode::Question,
            AssistantMode::Summary,
            AssistantMode::Explanation,
            AssistantMode::Quiz,
            AssistantMode::Concept,
        ] {
            let prompt = render_prompt(mode, "osmosis");
            assert!(prompt.ends_with("osmosis"));
            assert_ne!(prompt, "osmosis");
        }
    }

    #[test]
    fn test_user_message() {
        assert_eq!(render_user_message("", "Q"), "Q");
        assert_eq!(render_user_message("ctx", "Q"), "Context:\nctx\n\nQ");
    }
}
