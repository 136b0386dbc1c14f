//! Error types for the reply pipeline.

use parley_core::ParleyError;
use parley_storage::StorageError;

/// Error substrings that mark an upstream failure as transient.
const RETRYABLE_MARKERS: &[&str] = &[
    "fetch failed",
    "network",
    "etimedout",
    "econnreset",
    "econnrefused",
    "socket hang up",
    "429",
    "500",
    "502",
    "503",
    "504",
];

/// Error substrings that are reported to clients as a temporary outage.
const UNAVAILABLE_MARKERS: &[&str] = &[
    "fetch failed",
    "network",
    "timed out",
    "503",
    "socket hang up",
];

fn contains_marker(message: &str, markers: &[&str]) -> bool {
    let lower = message.to_lowercase();
    markers.iter().any(|marker| lower.contains(marker))
}

/// Errors from a single call to the upstream language model.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LlmError {
    #[error("Gemini API key is not configured")]
    MissingApiKey,
    /// The request never produced an HTTP response.
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("failed to decode model response: {0}")]
    Decode(String),
    #[error("model returned no text")]
    EmptyResponse,
    /// Every candidate model failed; carries the last error message.
    #[error("Gemini service is currently unavailable: {0}")]
    Unavailable(String),
    #[error("Failed to generate response. Gemini service is currently unavailable.")]
    NoCandidates,
}

impl LlmError {
    /// Whether another attempt against the same model may succeed.
    pub fn is_retryable(&self) -> bool {
        contains_marker(&self.to_string(), RETRYABLE_MARKERS)
    }
}

/// Errors from the conversation orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Message content or attachment is required")]
    EmptyMessage,
    #[error("Chat not found")]
    ConversationNotFound(uuid::Uuid),
    #[error(transparent)]
    Upstream(#[from] LlmError),
    #[error("storage error: {0}")]
    Storage(String),
}

impl ChatError {
    /// Whether this failure should be reported as a temporary outage.
    pub fn is_service_unavailable(&self) -> bool {
        match self {
            ChatError::Upstream(err) => contains_marker(&err.to_string(), UNAVAILABLE_MARKERS),
            _ => false,
        }
    }
}

impl From<StorageError> for ChatError {
    fn from(err: StorageError) -> Self {
        ChatError::Storage(err.to_string())
    }
}

impl From<ChatError> for ParleyError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Upstream(e) => ParleyError::Upstream(e.to_string()),
            ChatError::Storage(msg) => ParleyError::Storage(msg),
            other => ParleyError::Api(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_llm_error_display() {
        assert_eq!(
            LlmError::Http {
                status: 503,
                message: "overloaded".into()
            }
            .to_string(),
            "HTTP 503: overloaded"
        );
        assert_eq!(
            LlmError::Network("connection refused".into()).to_string(),
            "network error: connection refused"
        );
        assert_eq!(
            LlmError::NoCandidates.to_string(),
            "Failed to generate response. Gemini service is currently unavailable."
        );
    }

    #[test]
    fn test_retryable_classification() {
        let retryable = [
            LlmError::Network("dns".into()),
            LlmError::Http {
                status: 429,
                message: "rate limited".into(),
            },
            LlmError::Http {
                status: 500,
                message: "internal".into(),
            },
            LlmError::Http {
                status: 502,
                message: "bad gateway".into(),
            },
            LlmError::Http {
                status: 504,
                message: "gateway timeout".into(),
            },
            LlmError::Decode("socket hang up".into()),
            LlmError::Decode("read ECONNRESET".into()),
        ];
        for err in retryable {
            assert!(err.is_retryable(), "{} should be retryable", err);
        }

        let permanent = [
            LlmError::MissingApiKey,
            LlmError::Http {
                status: 400,
                message: "invalid argument".into(),
            },
            LlmError::Http {
                status: 404,
                message: "model not found".into(),
            },
            LlmError::EmptyResponse,
        ];
        for err in permanent {
            assert!(!err.is_retryable(), "{} should not be retryable", err);
        }
    }

    #[test]
    fn test_chat_error_display() {
        assert_eq!(
            ChatError::EmptyMessage.to_string(),
            "Message content or attachment is required"
        );
        assert_eq!(
            ChatError::ConversationNotFound(Uuid::new_v4()).to_string(),
            "Chat not found"
        );
        let err: ChatError = LlmError::MissingApiKey.into();
        assert_eq!(err.to_string(), "Gemini API key is not configured");
    }

    #[test]
    fn test_service_unavailable_classification() {
        let transient: ChatError =
            LlmError::Unavailable("network error: connection refused".into()).into();
        assert!(transient.is_service_unavailable());

        let overloaded: ChatError = LlmError::Http {
            status: 503,
            message: "overloaded".into(),
        }
        .into();
        assert!(overloaded.is_service_unavailable());

        let timed_out: ChatError = LlmError::Decode("operation timed out".into()).into();
        assert!(timed_out.is_service_unavailable());

        let rate_limited: ChatError = LlmError::Http {
            status: 429,
            message: "quota".into(),
        }
        .into();
        assert!(!rate_limited.is_service_unavailable());

        assert!(!ChatError::EmptyMessage.is_service_unavailable());
        assert!(!ChatError::Storage("disk full".into()).is_service_unavailable());
    }

    #[test]
    fn test_into_parley_error() {
        let err: ParleyError = ChatError::Storage("locked".into()).into();
        assert!(matches!(err, ParleyError::Storage(_)));

        let err: ParleyError = ChatError::Upstream(LlmError::EmptyResponse).into();
        assert!(matches!(err, ParleyError::Upstream(_)));
    }
}
