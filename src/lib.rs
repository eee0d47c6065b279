//! Study-buddy core: document structuring, bounded context assembly and an
//! assistant orchestrator for LLM-backed reading help.
//!
//! ```no_run
//! use bytes::Bytes;
//! use study_buddy::{
//!     AssistantMode, AssistantOrchestrator, Config, GenerateRequest, StructuringPipeline,
//! };
//!
//! # async fn run() -> study_buddy::Result<()> {
//! let config = Config::from_env()?;
//! let pipeline = StructuringPipeline::new(config.structuring.clone());
//! let bytes = Bytes::from_static(b"Chapter 1\nCells divide.");
//! let document = pipeline.ingest_auto("notes.txt", bytes);
//!
//! let assistant = AssistantOrchestrator::from_config(&config)?;
//! let answer = assistant
//!     .generate(
//!         GenerateRequest::new(AssistantMode::Explanation, "Why do cells divide?")
//!             .with_document(&document),
//!     )
//!     .await;
//! println!("{}", answer.response);
//! # Ok(())
//! # }
//! ```

pub mod assistant;
pub mod cache;
pub mod config;
pub mod context;
pub mod document;
pub mod error;
pub mod metrics;
pub mod telemetry;

pub use assistant::{
    AIResponse, AssistantMode, AssistantOrchestrator, CompletionClient, CompletionError,
    CompletionOptions, ConversationHistory, GenerateRequest, OpenAiCompletionClient, Reference,
};
pub use cache::{content_hash, DocumentCache, MokaDocumentCache};
pub use config::Config;
pub use context::{ContextBudgets, ContextBuilder, ContextRequest};
pub use document::{
    Chapter, Concept, Document, DocumentMetadata, DocumentSummary, DocumentType, ExtractedText,
    StructuringPipeline, TextExtractor,
};
pub use error::{ContextError, Result};
pub use telemetry::init_tracing;
