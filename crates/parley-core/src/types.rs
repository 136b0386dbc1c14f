use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Title every conversation starts with until its first user message.
pub const DEFAULT_TITLE: &str = "New Chat";

/// Number of characters of the first user message used as a title.
pub const TITLE_MAX_CHARS: usize = 50;

// =============================================================================
// Enums
// =============================================================================

/// Author of a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

// =============================================================================
// Conversation aggregate
// =============================================================================

/// Metadata for a file uploaded ahead of the message that references it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// File name on storage.
    pub filename: String,
    /// Name supplied by the client at upload time.
    pub original_name: String,
    pub mime_type: String,
    /// Size in bytes.
    pub size: u64,
    /// Retrieval URL, relative to the public directory.
    pub url: String,
}

impl Attachment {
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// One role-tagged message within a conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn user(content: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            attachments,
            created_at: Utc::now(),
        }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            content: content.into(),
            attachments: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// A titled, append-only sequence of turns owned by one user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub model: String,
    #[serde(default)]
    pub turns: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create an empty conversation.
    pub fn new(user_id: impl Into<String>, title: impl Into<String>, model: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            title: title.into(),
            model: model.into(),
            turns: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn push_turn(&mut self, turn: Turn) {
        self.updated_at = turn.created_at;
        self.turns.push(turn);
    }

    pub fn has_default_title(&self) -> bool {
        self.title == DEFAULT_TITLE
    }

    /// Replace the placeholder title with the leading characters of `message`.
    ///
    /// Leaves an already customised title untouched.
    pub fn apply_title_from(&mut self, message: &str) {
        if self.has_default_title() {
            self.title = message.chars().take(TITLE_MAX_CHARS).collect();
        }
    }

    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id,
            title: self.title.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Listing view of a conversation, without its turns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Request-scoped types
// =============================================================================

/// Per-message feature toggles. Every field defaults independently.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeatureOptions {
    pub web_search: bool,
    pub date_grounding: bool,
    pub code_mode: bool,
}

impl Default for FeatureOptions {
    fn default() -> Self {
        Self {
            web_search: true,
            date_grounding: true,
            code_mode: false,
        }
    }
}

impl FeatureOptions {
    /// All augmentation switched off.
    pub fn none() -> Self {
        Self {
            web_search: false,
            date_grounding: false,
            code_mode: false,
        }
    }
}

/// One web search hit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

/// One news headline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub title: String,
    pub link: String,
    /// Raw RFC 2822 publication date, possibly empty.
    pub published_at: String,
    /// Publisher name taken from the title suffix, possibly empty.
    pub source: String,
}

/// Verified identity of the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub name: String,
    pub email: String,
}

// =============================================================================
// Model catalog
// =============================================================================

/// A selectable upstream model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

/// Models offered to clients.
pub const AVAILABLE_MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: "gemini-2.5-flash",
        name: "Gemini 2.5 Flash",
        description: "Fast and versatile",
    },
    ModelInfo {
        id: "gemini-2.5-pro",
        name: "Gemini 2.5 Pro",
        description: "Most capable model",
    },
    ModelInfo {
        id: "gemini-2.0-flash",
        name: "Gemini 2.0 Flash",
        description: "Previous gen fast model",
    },
    ModelInfo {
        id: "gemini-2.0-flash-lite",
        name: "Gemini 2.0 Flash Lite",
        description: "Lightweight and fast",
    },
    ModelInfo {
        id: "gemini-1.5-pro",
        name: "Gemini 1.5 Pro",
        description: "Large context window",
    },
    ModelInfo {
        id: "gemini-1.5-flash",
        name: "Gemini 1.5 Flash",
        description: "Balanced speed and quality",
    },
];
