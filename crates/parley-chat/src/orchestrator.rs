//! Chat orchestrator: runs one user message through the reply pipeline.
//!
//! Validates and loads the conversation, picks a reply strategy, appends
//! the user and model turns, sets the title, and writes the conversation
//! back exactly once. Nothing is persisted when any step fails.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;

use parley_core::types::{Attachment, Conversation, FeatureOptions, Turn};
use parley_storage::ConversationStore;

use crate::answers::{date_time_answer, headline_digest};
use crate::classifier::{classify, QueryKind};
use crate::error::ChatError;
use crate::llm::{ChatMessage, InlineImage, ReplyGenerator};
use crate::prompt::PromptAugmenter;
use crate::providers::NewsFeed;

/// Fallback vision prompt when the augmented prompt is empty.
const DESCRIBE_IMAGE_PROMPT: &str = "Describe this image in detail.";

/// A user message as received from the client.
#[derive(Clone, Debug, Default)]
pub struct IncomingMessage {
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub features: FeatureOptions,
}

/// Result of a successfully handled message.
#[derive(Clone, Debug)]
pub struct MessageOutcome {
    pub reply: String,
    /// The conversation as persisted, including both new turns.
    pub conversation: Conversation,
}

/// Central coordinator for the reply pipeline.
pub struct ChatOrchestrator {
    store: Arc<dyn ConversationStore>,
    replies: ReplyGenerator,
    prompts: PromptAugmenter,
    news: Arc<dyn NewsFeed>,
    news_limit: usize,
    public_dir: PathBuf,
}

impl ChatOrchestrator {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        replies: ReplyGenerator,
        prompts: PromptAugmenter,
        news: Arc<dyn NewsFeed>,
        news_limit: usize,
        public_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            replies,
            prompts,
            news,
            news_limit,
            public_dir: public_dir.into(),
        }
    }

    pub fn default_model(&self) -> &str {
        self.replies.default_model()
    }

    /// Handle one message end to end.
    pub async fn handle_message(
        &self,
        conversation_id: Uuid,
        user_id: &str,
        message: IncomingMessage,
    ) -> Result<MessageOutcome, ChatError> {
        let message = IncomingMessage {
            content: message.content.trim().to_string(),
            ..message
        };

        let working = self.begin_turn(conversation_id, user_id, &message)?;
        let reply = self.reply_to(&working, &message).await?;
        let conversation = self.commit(working, &reply, &message.content)?;

        Ok(MessageOutcome { reply, conversation })
    }

    /// Validate the message and return the stored conversation with the
    /// user turn appended. Nothing is written.
    pub fn begin_turn(
        &self,
        conversation_id: Uuid,
        user_id: &str,
        message: &IncomingMessage,
    ) -> Result<Conversation, ChatError> {
        if message.content.is_empty() && message.attachments.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let mut conversation = self
            .store
            .find_by_id_and_owner(conversation_id, user_id)?
            .ok_or(ChatError::ConversationNotFound(conversation_id))?;

        conversation.push_turn(Turn::user(
            message.content.clone(),
            message.attachments.clone(),
        ));
        Ok(conversation)
    }

    /// Produce the reply text for the last turn of `working`.
    pub async fn reply_to(
        &self,
        working: &Conversation,
        message: &IncomingMessage,
    ) -> Result<String, ChatError> {
        let now = Utc::now();
        let content = message.content.as_str();
        let features = &message.features;
        let kind = classify(content, features, !message.attachments.is_empty());

        info!(
            conversation_id = %working.id,
            kind = ?kind,
            attachments = message.attachments.len(),
            "Handling message"
        );

        match kind {
            QueryKind::DateTime => return Ok(date_time_answer(now)),
            QueryKind::News => {
                let items = self.news.search_news(content, self.news_limit).await;
                if !items.is_empty() {
                    return Ok(headline_digest(&items, now));
                }
                debug!(conversation_id = %working.id, "No headlines found, asking the model");
            }
            QueryKind::Plain => {}
        }

        let images: Vec<&Attachment> = message
            .attachments
            .iter()
            .filter(|a| a.is_image())
            .collect();

        let prompt = self.prompts.build(content, features, now).await;

        if images.is_empty() {
            let history = build_history(&working.turns, prompt, true);
            return Ok(self.replies.generate(history, &working.model).await?);
        }

        let loaded = self.load_images(&images).await;
        if loaded.is_empty() {
            warn!(conversation_id = %working.id, "No attached image was readable");
            let history = build_history(&working.turns, prompt, false);
            return Ok(self.replies.generate(history, &working.model).await?);
        }

        let prompt = if prompt.is_empty() {
            DESCRIBE_IMAGE_PROMPT.to_string()
        } else {
            prompt
        };
        Ok(self
            .replies
            .generate_with_images(&prompt, loaded, &working.model)
            .await?)
    }

    /// Append the model turn, apply the title rule, and persist.
    pub fn commit(
        &self,
        mut working: Conversation,
        reply: &str,
        content: &str,
    ) -> Result<Conversation, ChatError> {
        working.push_turn(Turn::model(reply));
        if !content.is_empty() {
            working.apply_title_from(content);
        }

        if !self.store.update(&working)? {
            return Err(ChatError::ConversationNotFound(working.id));
        }
        Ok(working)
    }

    /// Read and encode every readable image concurrently, preserving order.
    async fn load_images(&self, attachments: &[&Attachment]) -> Vec<InlineImage> {
        let reads = attachments.iter().map(|attachment| async move {
            let path = resolve_public_path(&self.public_dir, &attachment.url)?;
            match tokio::fs::read(&path).await {
                Ok(bytes) => Some(InlineImage {
                    mime_type: attachment.mime_type.clone(),
                    data: BASE64_STANDARD.encode(bytes),
                }),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable attachment");
                    None
                }
            }
        });

        join_all(reads).await.into_iter().flatten().collect()
    }
}

/// Map an attachment URL to a file under the public directory.
///
/// Returns `None` for URLs that would escape the directory.
fn resolve_public_path(public_dir: &Path, url: &str) -> Option<PathBuf> {
    let relative = Path::new(url.strip_prefix('/').unwrap_or(url));
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        warn!(url, "Rejecting attachment path outside the public directory");
        return None;
    }
    Some(public_dir.join(relative))
}

/// Model history: every turn in order, with the last one replaced by `prompt`.
///
/// When `annotate` is set, earlier turns that carried attachments get their
/// attachment names appended.
fn build_history(turns: &[Turn], prompt: String, annotate: bool) -> Vec<ChatMessage> {
    let Some((_, earlier)) = turns.split_last() else {
        return Vec::new();
    };

    let mut history: Vec<ChatMessage> = earlier
        .iter()
        .map(|turn| {
            let content = if annotate && !turn.attachments.is_empty() {
                let names: Vec<&str> = turn
                    .attachments
                    .iter()
                    .map(|a| a.original_name.as_str())
                    .collect();
                format!("{}\n\nAttachments: {}", turn.content, names.join(", "))
                    .trim()
                    .to_string()
            } else {
                turn.content.clone()
            };
            ChatMessage::new(turn.role, content)
        })
        .collect();

    if let Some(last) = turns.last() {
        history.push(ChatMessage::new(last.role, prompt));
    }
    history
}
