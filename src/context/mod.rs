//! Context assembly for assistant queries

pub mod builder;
pub mod pages;
pub mod token_estimator;

pub use builder::{ContextBudgets, ContextBuilder, ContextRequest};
pub use pages::{chapter_for_page, clamp_page};
pub use token_estimator::{default_estimator, TiktokenEstimator, TokenEstimator, WordBasedEstimator};
