//! Gemini REST transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use parley_core::config::LlmConfig;

use super::{ChatMessage, GenerateRequest, InlineImage, LanguageModel};
use crate::error::LlmError;

/// Sent when a vision request has neither text nor images.
const EMPTY_VISION_PROMPT: &str = "Describe this.";

/// `LanguageModel` implementation that talks to the Gemini HTTP API.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>, base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(
            config.api_key.clone(),
            config.base_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    async fn send_request(
        &self,
        model: &str,
        api_key: &str,
        body: &GenerateContentRequest,
    ) -> Result<String, LlmError> {
        let url = format!("{}/{}:generateContent", self.base_url, model);

        let response = self
            .client
            .post(url)
            .query(&[("key", api_key)])
            .json(body)
            .send()
            .await
            .map_err(|err| LlmError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body_text));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|err| LlmError::Decode(err.to_string()))?;

        extract_text_response(parsed)
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(&self, model: &str, request: &GenerateRequest) -> Result<String, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;
        let body = GenerateContentRequest::from_request(request);
        debug!(model, contents = body.contents.len(), "Calling Gemini");
        self.send_request(model, api_key, &body).await
    }
}

// =============================================================================
// Wire format
// =============================================================================

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, PartialEq, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineDataPayload,
    },
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineDataPayload {
    mime_type: String,
    data: String,
}

impl GenerateContentRequest {
    fn from_request(request: &GenerateRequest) -> Self {
        let contents = match request {
            GenerateRequest::Chat(history) => history.iter().map(history_content).collect(),
            GenerateRequest::Vision { prompt, images } => vec![Content {
                role: "user".to_string(),
                parts: vision_parts(prompt, images),
            }],
        };
        Self { contents }
    }
}

fn history_content(message: &ChatMessage) -> Content {
    Content {
        role: message.role.as_str().to_string(),
        parts: vec![Part::Text {
            text: message.content.clone(),
        }],
    }
}

/// Text first (when present), then one inline part per image.
fn vision_parts(prompt: &str, images: &[InlineImage]) -> Vec<Part> {
    let mut parts = Vec::with_capacity(images.len() + 1);
    if !prompt.is_empty() {
        parts.push(Part::Text {
            text: prompt.to_string(),
        });
    }
    for image in images {
        parts.push(Part::InlineData {
            inline_data: InlineDataPayload {
                mime_type: image.mime_type.clone(),
                data: image.data.clone(),
            },
        });
    }
    if parts.is_empty() {
        parts.push(Part::Text {
            text: EMPTY_VISION_PROMPT.to_string(),
        });
    }
    parts
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Deserialize)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

/// Concatenated text parts of the first candidate.
fn extract_text_response(response: GenerateContentResponse) -> Result<String, LlmError> {
    let text: String = response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts.into_iter().filter_map(|part| part.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        Err(LlmError::EmptyResponse)
    } else {
        Ok(text)
    }
}

fn map_http_error(status: StatusCode, body: &str) -> LlmError {
    let message = serde_json::from_str::<ErrorWrapper>(body)
        .ok()
        .and_then(|wrapper| {
            let msg = wrapper.error.message?;
            Some(match wrapper.error.status {
                Some(status_text) if !status_text.is_empty() => format!("{status_text}: {msg}"),
                _ => msg,
            })
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| body.trim().to_string())
        });

    LlmError::Http {
        status: status.as_u16(),
        message,
    }
}
