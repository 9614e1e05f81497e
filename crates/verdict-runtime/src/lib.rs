//! # verdict-runtime
//!
//! Concurrent multi-agent evaluation runtime for Verdict.
//!
//! One [`Dispatcher`] fans a validated conversation out to the enabled
//! evaluator units (coherence, factuality with claim verification, safety,
//! helpfulness, SOP compliance, prompt improvement), bounds each by its own
//! timeout under a shared deadline, and folds the partially-failing results
//! into one `EvaluationResult`.
//!
//! Remote capabilities sit behind two narrow traits, [`providers::LlmProvider`]
//! and [`search::SearchProvider`], so the orchestration is fully testable
//! with deterministic stubs. HTTP implementations are provided for OpenAI
//! completions and Tavily search.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use verdict_core::{ConversationMessage, EvaluationRequest};
//! use verdict_runtime::{Dispatcher, OpenAiProvider, TavilySearch};
//!
//! let dispatcher = Dispatcher::builder()
//!     .provider(Arc::new(OpenAiProvider::from_env()?))
//!     .search(Arc::new(TavilySearch::from_env()?))
//!     .build()?;
//!
//! let request = EvaluationRequest::new(
//!     vec![
//!         ConversationMessage::user("What's 2+2?"),
//!         ConversationMessage::assistant("2+2 equals 4."),
//!     ],
//!     "gpt-5-mini",
//! );
//!
//! let result = dispatcher.evaluate(&request).await?;
//! println!("{:?}", result.overall_status);
//! ```

pub mod cache;
pub mod config;
pub mod dispatcher;
pub mod prompts;
pub mod providers;
pub mod registry;
pub mod search;
pub mod structured;
pub mod units;

pub use cache::OutcomeCache;
pub use config::{CacheConfig, RuntimeConfig};
pub use dispatcher::{BuildError, Dispatcher, DispatcherBuilder, EvaluateError};
pub use providers::{
    ApiCredential, ChatMessage, CompletionConfig, CompletionResponse, CredentialSource,
    LlmProvider, OpenAiProvider, ProviderError, TokenUsage,
};
pub use registry::{Reloadable, SharedPricing, SharedRules};
pub use search::{SearchError, SearchHit, SearchProvider, TavilySearch};
pub use structured::StructuredError;
pub use units::UnitContext;
