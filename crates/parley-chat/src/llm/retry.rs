//! Candidate-model fallback with bounded retries.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::LlmError;

/// How often a single candidate model is retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per candidate, including the first.
    pub max_attempts: u32,
    /// Delay after attempt `n` is `n * base_delay`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(300),
        }
    }
}

impl RetryPolicy {
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Ordered, de-duplicated model list: requested, configured default, fallbacks.
///
/// Blank entries are dropped; the first occurrence of a name wins.
pub fn build_candidates(requested: &str, configured: &str, fallbacks: &[String]) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::new();
    let all = [requested, configured]
        .into_iter()
        .chain(fallbacks.iter().map(String::as_str));
    for name in all {
        let name = name.trim();
        if !name.is_empty() && !candidates.iter().any(|c| c == name) {
            candidates.push(name.to_string());
        }
    }
    candidates
}

/// Try each candidate in order until one call succeeds.
///
/// A retryable failure is retried on the same model up to
/// `policy.max_attempts` times with a linearly growing delay. A
/// non-retryable failure moves on to the next candidate immediately.
pub async fn generate_with_fallback<F, Fut>(
    candidates: &[String],
    policy: &RetryPolicy,
    mut call: F,
) -> Result<String, LlmError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<String, LlmError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error: Option<LlmError> = None;

    for model in candidates {
        for attempt in 1..=max_attempts {
            match call(model.clone()).await {
                Ok(text) => {
                    debug!(model = %model, attempt, "Model call succeeded");
                    return Ok(text);
                }
                Err(err) => {
                    let retry = err.is_retryable() && attempt < max_attempts;
                    warn!(model = %model, attempt, retry, error = %err, "Model call failed");
                    last_error = Some(err);
                    if !retry {
                        break;
                    }
                    tokio::time::sleep(policy.delay_after(attempt)).await;
                }
            }
        }
    }

    Err(match last_error {
        Some(err) => LlmError::Unavailable(err.to_string()),
        None => LlmError::NoCandidates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn no_delay() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::ZERO,
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    /// Records every model called and answers from `script`.
    fn recorder(
        script: impl Fn(&str, usize) -> Result<String, LlmError> + Clone,
    ) -> (
        Arc<Mutex<Vec<String>>>,
        impl FnMut(String) -> std::future::Ready<Result<String, LlmError>>,
    ) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let log = calls.clone();
        let call = move |model: String| {
            let mut log = log.lock().unwrap();
            log.push(model.clone());
            let n = log.iter().filter(|m| **m == model).count();
            std::future::ready(script(&model, n))
        };
        (calls, call)
    }

    #[test]
    fn test_candidates_dedup_preserving_order() {
        let fallbacks = names(&["gemini-2.5-flash", "gemini-2.0-flash", "gemini-1.5-flash", "gemini-1.5-pro"]);
        let candidates = build_candidates("gemini-2.0-flash", "gemini-2.5-flash", &fallbacks);
        assert_eq!(
            candidates,
            names(&["gemini-2.0-flash", "gemini-2.5-flash", "gemini-1.5-flash", "gemini-1.5-pro"])
        );
    }

    #[test]
    fn test_candidates_drop_blank_entries() {
        let candidates = build_candidates("", "  ", &names(&["gemini-1.5-pro", ""]));
        assert_eq!(candidates, names(&["gemini-1.5-pro"]));
        assert!(build_candidates("", "", &[]).is_empty());
    }

    #[test]
    fn test_delay_grows_linearly() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_millis(300));
        assert_eq!(policy.delay_after(2), Duration::from_millis(600));
    }

    #[tokio::test]
    async fn test_first_success_returns() {
        let (calls, call) = recorder(|_, _| Ok("hello".to_string()));
        let out = generate_with_fallback(&names(&["a", "b"]), &no_delay(), call).await;
        assert_eq!(out.unwrap(), "hello");
        assert_eq!(*calls.lock().unwrap(), names(&["a"]));
    }

    #[tokio::test]
    async fn test_transient_failure_retried_three_times_then_next_candidate() {
        let (calls, call) = recorder(|model, _| {
            if model == "a" {
                Err(LlmError::Http {
                    status: 503,
                    message: "overloaded".into(),
                })
            } else {
                Ok("from b".to_string())
            }
        });
        let out = generate_with_fallback(&names(&["a", "b"]), &no_delay(), call).await;
        assert_eq!(out.unwrap(), "from b");
        assert_eq!(*calls.lock().unwrap(), names(&["a", "a", "a", "b"]));
    }

    #[tokio::test]
    async fn test_non_transient_failure_moves_on_after_one_attempt() {
        let (calls, call) = recorder(|model, _| {
            if model == "a" {
                Err(LlmError::Http {
                    status: 404,
                    message: "model not found".into(),
                })
            } else {
                Ok("from b".to_string())
            }
        });
        let out = generate_with_fallback(&names(&["a", "b"]), &no_delay(), call).await;
        assert_eq!(out.unwrap(), "from b");
        assert_eq!(*calls.lock().unwrap(), names(&["a", "b"]));
    }

    #[tokio::test]
    async fn test_recovers_on_second_attempt() {
        let (calls, call) = recorder(|_, n| {
            if n == 1 {
                Err(LlmError::Network("connection reset".into()))
            } else {
                Ok("ok".to_string())
            }
        });
        let out = generate_with_fallback(&names(&["a", "b"]), &no_delay(), call).await;
        assert_eq!(out.unwrap(), "ok");
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_last_error() {
        let (calls, call) = recorder(|model, _| {
            Err(LlmError::Http {
                status: 503,
                message: format!("{} overloaded", model),
            })
        });
        let err = generate_with_fallback(&names(&["a", "b"]), &no_delay(), call)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            LlmError::Unavailable("HTTP 503: b overloaded".to_string())
        );
        assert_eq!(calls.lock().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_no_candidates() {
        let (_, call) = recorder(|_, _| Ok("unused".to_string()));
        let err = generate_with_fallback(&[], &no_delay(), call).await.unwrap_err();
        assert_eq!(err, LlmError::NoCandidates);
    }
}
