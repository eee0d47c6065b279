//! Assistant orchestration over a remote completion API

pub mod artifacts;
pub mod circuit_breaker;
pub mod completion;
pub mod history;
pub mod models;
pub mod orchestrator;
pub mod prompts;
pub mod references;

pub use circuit_breaker::{BreakerState, CircuitBreaker, CircuitBreakerConfig};
pub use completion::{CompletionClient, CompletionError, CompletionOptions, OpenAiCompletionClient};
pub use history::ConversationHistory;
pub use models::{AIResponse, AssistantMode, ConceptEdge, ConceptMap, ConceptNode, Reference};
pub use orchestrator::{fallback_response, AssistantOrchestrator, GenerateRequest};
