//! Route handler functions for all API endpoints.
//!
//! Each handler extracts path parameters, the session user, and a typed
//! request body, calls into the store or the chat orchestrator, and
//! returns a JSON response.

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use parley_chat::IncomingMessage;
use parley_core::types::{
    Attachment, Conversation, ConversationSummary, FeatureOptions, ModelInfo, Role,
    SessionUser, AVAILABLE_MODELS, DEFAULT_TITLE,
};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request types
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateChatRequest {
    pub title: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateChatRequest {
    pub title: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub features: FeatureOptions,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub success: bool,
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub success: bool,
    pub user: SessionUser,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelsResponse {
    pub success: bool,
    pub models: &'static [ModelInfo],
    pub default_model: String,
}

#[derive(Debug, Serialize)]
pub struct ChatListResponse {
    pub success: bool,
    pub chats: Vec<ConversationSummary>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub success: bool,
    pub chat: Conversation,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub success: bool,
    pub deleted: u64,
}

#[derive(Debug, Serialize)]
pub struct ReplyMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: ReplyMessage,
    pub chat: Conversation,
}

// =============================================================================
// Helpers
// =============================================================================

/// Malformed ids cannot name a stored chat, so they read as not found.
fn parse_chat_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::chat_not_found())
}

/// Trimmed value, or `None` when absent or blank.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /health - health check.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /auth/me - the authenticated user.
pub async fn auth_me(Extension(user): Extension<SessionUser>) -> Json<UserResponse> {
    Json(UserResponse {
        success: true,
        user,
    })
}

/// GET /models - model catalog and the default model.
pub async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        success: true,
        models: AVAILABLE_MODELS,
        default_model: state.default_model(),
    })
}

/// GET /chats - the caller's chats, most recently updated first.
pub async fn list_chats(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<ChatListResponse>, ApiError> {
    let chats = state.store.list_for_owner(&user.id)?;
    Ok(Json(ChatListResponse {
        success: true,
        chats,
    }))
}

/// POST /chats - create an empty chat.
///
/// An empty body is treated as `{}`.
pub async fn create_chat(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    body: Bytes,
) -> Result<Json<ChatResponse>, ApiError> {
    let request: CreateChatRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CreateChatRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))?
    };

    let title = non_blank(request.title).unwrap_or_else(|| DEFAULT_TITLE.to_string());
    let model = non_blank(request.model).unwrap_or_else(|| state.default_model());

    let chat = Conversation::new(user.id, title, model);
    state.store.create(&chat)?;
    info!(conversation_id = %chat.id, model = %chat.model, "Chat created");

    Ok(Json(ChatResponse {
        success: true,
        chat,
    }))
}

/// DELETE /chats - delete every chat the caller owns.
pub async fn delete_all_chats(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let deleted = state.store.delete_all_for_owner(&user.id)?;
    info!(user_id = %user.id, deleted, "Chats cleared");
    Ok(Json(DeletedResponse {
        success: true,
        deleted,
    }))
}

/// GET /chats/{id} - one chat with its full history.
pub async fn get_chat(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
) -> Result<Json<ChatResponse>, ApiError> {
    let id = parse_chat_id(&id)?;
    let chat = state
        .store
        .find_by_id_and_owner(id, &user.id)?
        .ok_or_else(ApiError::chat_not_found)?;

    Ok(Json(ChatResponse {
        success: true,
        chat,
    }))
}

/// PATCH /chats/{id} - rename a chat or switch its model.
pub async fn update_chat(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let id = parse_chat_id(&id)?;
    let Json(request) = payload?;

    let title = non_blank(request.title);
    let model = non_blank(request.model);
    if title.is_none() && model.is_none() {
        return Err(ApiError::BadRequest("Nothing to update".to_string()));
    }

    let mut chat = state
        .store
        .find_by_id_and_owner(id, &user.id)?
        .ok_or_else(ApiError::chat_not_found)?;
    if let Some(title) = title {
        chat.title = title;
    }
    if let Some(model) = model {
        chat.model = model;
    }
    chat.updated_at = Utc::now();

    if !state.store.update(&chat)? {
        return Err(ApiError::chat_not_found());
    }

    Ok(Json(ChatResponse {
        success: true,
        chat,
    }))
}

/// DELETE /chats/{id} - delete one chat.
pub async fn delete_chat(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let id = parse_chat_id(&id)?;
    if !state.store.delete_one(id, &user.id)? {
        return Err(ApiError::chat_not_found());
    }

    info!(conversation_id = %id, "Chat deleted");
    Ok(Json(DeletedResponse {
        success: true,
        deleted: 1,
    }))
}

/// POST /chats/{id}/messages - send a message and return the reply.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_chat_id(&id)?;
    let Json(request) = payload?;

    let outcome = state
        .chat
        .handle_message(
            id,
            &user.id,
            IncomingMessage {
                content: request.content,
                attachments: request.attachments,
                features: request.features,
            },
        )
        .await?;

    Ok(Json(MessageResponse {
        success: true,
        message: ReplyMessage {
            role: Role::Model,
            content: outcome.reply,
        },
        chat: outcome.conversation,
    }))
}
