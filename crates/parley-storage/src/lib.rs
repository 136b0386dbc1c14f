//! Parley Storage crate - SQLite persistence for conversations.
//!
//! Provides a WAL-mode SQLite database with migrations and the
//! `ConversationStore` implementation used by the chat pipeline and the
//! HTTP surface.

pub mod db;
pub mod error;
pub mod migrations;
pub mod repository;

pub use db::Database;
pub use error::StorageError;
pub use repository::{ConversationStore, SqliteConversationStore};
