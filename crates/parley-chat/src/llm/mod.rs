//! Reply generation against the upstream language model.

pub mod gemini;
pub mod retry;

use std::sync::Arc;

use async_trait::async_trait;

use parley_core::config::{normalize_model_name, LlmConfig, DEFAULT_MODEL};
use parley_core::types::Role;

use crate::error::LlmError;

pub use gemini::GeminiClient;
pub use retry::{build_candidates, generate_with_fallback, RetryPolicy};

/// One history entry sent to the model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Base64-encoded image payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

/// What to send in a single model call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GenerateRequest {
    /// Multi-turn text conversation; the last entry is the message to answer.
    Chat(Vec<ChatMessage>),
    /// Single-turn multimodal prompt.
    Vision {
        prompt: String,
        images: Vec<InlineImage>,
    },
}

/// A single call to one named model. Retries and fallback live in [`ReplyGenerator`].
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, model: &str, request: &GenerateRequest) -> Result<String, LlmError>;
}

/// Calls the language model with candidate-model fallback and retries.
#[derive(Clone)]
pub struct ReplyGenerator {
    model: Arc<dyn LanguageModel>,
    default_model: String,
    fallback_models: Vec<String>,
    policy: RetryPolicy,
}

impl ReplyGenerator {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        default_model: impl Into<String>,
        fallback_models: Vec<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            model,
            default_model: default_model.into(),
            fallback_models,
            policy,
        }
    }

    pub fn from_config(model: Arc<dyn LanguageModel>, config: &LlmConfig) -> Self {
        Self::new(
            model,
            normalize_model_name(&config.default_model).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            config.fallback_models.clone(),
            RetryPolicy {
                max_attempts: config.max_attempts,
                base_delay: std::time::Duration::from_millis(config.retry_delay_ms),
            },
        )
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn candidates(&self, requested_model: &str) -> Vec<String> {
        build_candidates(requested_model, &self.default_model, &self.fallback_models)
    }

    /// Answer the last message of `history`, using the earlier entries as context.
    pub async fn generate(
        &self,
        history: Vec<ChatMessage>,
        requested_model: &str,
    ) -> Result<String, LlmError> {
        self.run(GenerateRequest::Chat(history), requested_model).await
    }

    pub async fn generate_with_images(
        &self,
        prompt: &str,
        images: Vec<InlineImage>,
        requested_model: &str,
    ) -> Result<String, LlmError> {
        let request = GenerateRequest::Vision {
            prompt: prompt.to_string(),
            images,
        };
        self.run(request, requested_model).await
    }

    async fn run(&self, request: GenerateRequest, requested_model: &str) -> Result<String, LlmError> {
        let candidates = self.candidates(requested_model);
        let request = Arc::new(request);
        generate_with_fallback(&candidates, &self.policy, |model| {
            let backend = self.model.clone();
            let request = request.clone();
            async move { backend.generate(&model, &request).await }
        })
        .await
    }
}
