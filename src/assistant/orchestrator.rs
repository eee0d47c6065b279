//! Assistant orchestrator: context, prompt, completion, fallback, history.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use super::artifacts::{build_concept_map, socratic_questions};
use super::completion::{
    CompletionClient, CompletionError, CompletionOptions, OpenAiCompletionClient,
};
use super::history::ConversationHistory;
use super::models::{AIResponse, AssistantMode};
use super::prompts::{render_prompt, render_user_message, SYSTEM_PROMPT};
use super::references::extract_references;
use crate::config::Config;
use crate::context::{default_estimator, ContextBuilder, ContextRequest, TokenEstimator};
use crate::document::text::char_len;
use crate::document::Document;
use crate::error::Result;
use crate::metrics::METRICS;

/// One query against an optional document
#[derive(Debug, Clone, Copy)]
pub struct GenerateRequest<'a> {
    pub mode: AssistantMode,
    pub query: &'a str,
    pub document: Option<&'a Document>,
    pub selected_text: Option<&'a str>,
    pub current_page: Option<f64>,
    pub extended_context: bool,
    pub extra_context: Option<&'a str>,
}

impl<'a> GenerateRequest<'a> {
    pub fn new(mode: AssistantMode, query: &'a str) -> Self {
        Self {
            mode,
            query,
            document: None,
            selected_text: None,
            current_page: None,
            extended_context: false,
            extra_context: None,
        }
    }

    pub fn with_document(mut self, document: &'a Document) -> Self {
        self.document = Some(document);
        self
    }

    pub fn with_selection(mut self, text: &'a str) -> Self {
        self.selected_text = Some(text);
        self
    }

    pub fn with_page(mut self, page: f64) -> Self {
        self.current_page = Some(page);
        self
    }

    pub fn extended(mut self, extended: bool) -> Self {
        self.extended_context = extended;
        self
    }

    pub fn with_extra_context(mut self, text: &'a str) -> Self {
        self.extra_context = Some(text);
        self
    }
}

/// Counts one in-flight request for its lifetime
struct LoadingGuard<'a>(&'a AtomicUsize);

impl<'a> LoadingGuard<'a> {
    fn enter(in_flight: &'a AtomicUsize) -> Self {
        in_flight.fetch_add(1, Ordering::SeqCst);
        Self(in_flight)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Local stand-in for a completion that failed
pub fn fallback_response(error: &CompletionError, query: &str, context: &str) -> String {
    let context_chars = char_len(context);
    let grounding = if context_chars == 0 {
        "No document context was available.".to_string()
    } else {
        format!("{context_chars} characters of document context were prepared for it.")
    };
    format!(
        "[offline mode: {}] The assistant is unavailable right now, so your question \
         \"{}\" was not answered. {} Try again once the connection is restored.",
        error.reason(),
        query.trim(),
        grounding
    )
}

/// Turns queries into recorded exchanges
pub struct AssistantOrchestrator {
    client: Arc<dyn CompletionClient>,
    builder: ContextBuilder,
    estimator: Arc<dyn TokenEstimator>,
    options: CompletionOptions,
    history: ConversationHistory,
    in_flight: Arc<AtomicUsize>,
}

impl AssistantOrchestrator {
    pub fn new(client: Arc<dyn CompletionClient>, builder: ContextBuilder) -> Self {
        Self {
            client,
            builder,
            estimator: default_estimator(),
            options: CompletionOptions::default(),
            history: ConversationHistory::new(),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Orchestrator backed by the configured completion API. Fails when no API
    /// key is configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = OpenAiCompletionClient::new(config.assistant.clone())?;
        Ok(Self::new(
            Arc::new(client),
            ContextBuilder::new(config.context.clone()),
        ))
    }

    pub fn with_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// True while at least one `generate` call is in flight
    pub fn is_loading(&self) -> bool {
        self.in_flight() > 0
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Shared handle to the in-flight counter, for observers such as a UI layer
    pub fn in_flight_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.in_flight)
    }

    pub fn context_builder(&self) -> &ContextBuilder {
        &self.builder
    }

    /// Answer a query. Completion failures produce an offline fallback
    /// response; the exchange is recorded in history either way.
    pub async fn generate(&self, request: GenerateRequest<'_>) -> AIResponse {
        let _loading = LoadingGuard::enter(&self.in_flight);

        let prior_references = self
            .history
            .last()
            .map(|previous| previous.references)
            .unwrap_or_default();

        let context = self.builder.build_context(&ContextRequest {
            document: request.document,
            current_page: request.current_page,
            selected_text: request.selected_text,
            extended_context: request.extended_context,
            extra_context: request.extra_context,
            prior_references: &prior_references,
        });

        let prompt = render_prompt(request.mode, request.query);
        let system = self.options.system_prompt.as_deref().unwrap_or(SYSTEM_PROMPT);
        let user_message = render_user_message(&context, &prompt);
        let estimated_prompt_tokens = self
            .estimator
            .estimate_all(&[system, user_message.as_str()]);

        let start = Instant::now();
        let result = match self.client.complete(&prompt, &context, &self.options).await {
            Ok(text) if text.trim().is_empty() => Err(CompletionError::EmptyCompletion),
            other => other,
        };
        let elapsed = start.elapsed().as_secs_f64();
        METRICS.record_completion(request.mode.as_str(), result.is_ok(), elapsed);

        let (response, is_fallback) = match result {
            Ok(text) => {
                info!(
                    "Completed {} query in {:.2}s (~{} prompt tokens)",
                    request.mode, elapsed, estimated_prompt_tokens
                );
                (text, false)
            }
            Err(e) => {
                warn!("Completion failed, answering offline: {}", e);
                METRICS.record_fallback(e.reason());
                (fallback_response(&e, request.query, &context), true)
            }
        };

        let references = extract_references(&context);
        let concept_map = match (request.mode, request.document) {
            (AssistantMode::Concept, Some(doc)) => Some(build_concept_map(doc)),
            _ => None,
        };
        let socratic_questions = match request.mode {
            AssistantMode::Question | AssistantMode::Quiz => {
                socratic_questions(request.document, request.query)
            }
            _ => Vec::new(),
        };

        let exchange = AIResponse {
            id: Uuid::new_v4().to_string(),
            mode: request.mode,
            query: request.query.to_string(),
            response,
            context,
            timestamp: Utc::now(),
            references,
            concept_map,
            socratic_questions,
            is_fallback,
            estimated_prompt_tokens,
        };

        self.history.push(exchange.clone());
        exchange
    }
}
