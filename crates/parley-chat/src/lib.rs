//! Message augmentation and reply orchestration for Parley.
//!
//! Classifies incoming messages, pulls live context from web search and
//! news feeds, builds the final prompt, and calls the upstream language
//! model with candidate-model fallback and retries.

pub mod answers;
pub mod classifier;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod prompt;
pub mod providers;

pub use classifier::{classify, QueryKind};
pub use error::{ChatError, LlmError};
pub use llm::{GeminiClient, LanguageModel, ReplyGenerator, RetryPolicy};
pub use orchestrator::{ChatOrchestrator, IncomingMessage, MessageOutcome};
pub use prompt::PromptAugmenter;
pub use providers::{DuckDuckGoSearch, GoogleNewsFeed, NewsFeed, WebSearch};
