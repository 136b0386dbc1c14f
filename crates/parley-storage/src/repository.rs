//! Conversation persistence.
//!
//! Each conversation is a single row; its turns are stored as one JSON
//! document so that replacing a conversation is a single-row write.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use parley_core::types::{Conversation, ConversationSummary, Turn};

use crate::db::Database;
use crate::error::StorageError;

/// Owner-scoped document store for conversations.
///
/// Every lookup is keyed by both conversation id and owner, so one user can
/// never read or mutate another user's conversation.
pub trait ConversationStore: Send + Sync {
    fn find_by_id_and_owner(
        &self,
        id: Uuid,
        user_id: &str,
    ) -> Result<Option<Conversation>, StorageError>;

    /// Summaries for the owner, most recently updated first.
    fn list_for_owner(&self, user_id: &str) -> Result<Vec<ConversationSummary>, StorageError>;

    fn create(&self, conversation: &Conversation) -> Result<(), StorageError>;

    /// Replace the stored document. Returns `false` if no such conversation exists.
    fn update(&self, conversation: &Conversation) -> Result<bool, StorageError>;

    /// Returns `false` if no such conversation exists.
    fn delete_one(&self, id: Uuid, user_id: &str) -> Result<bool, StorageError>;

    /// Returns the number of conversations removed.
    fn delete_all_for_owner(&self, user_id: &str) -> Result<u64, StorageError>;
}

/// SQLite-backed `ConversationStore`.
pub struct SqliteConversationStore {
    db: Arc<Database>,
}

impl SqliteConversationStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn count(&self) -> Result<u64, StorageError> {
        self.db.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM conversations", [], |row| row.get(0))?;
            Ok(count as u64)
        })
    }
}

impl ConversationStore for SqliteConversationStore {
    fn find_by_id_and_owner(
        &self,
        id: Uuid,
        user_id: &str,
    ) -> Result<Option<Conversation>, StorageError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, title, model, turns, created_at, updated_at
                 FROM conversations WHERE id = ?1 AND user_id = ?2",
            )?;

            let result = stmt
                .query_row(rusqlite::params![id.to_string(), user_id], |row| {
                    Ok(row_to_conversation(row))
                })
                .optional()?;

            result.transpose()
        })
    }

    fn list_for_owner(&self, user_id: &str) -> Result<Vec<ConversationSummary>, StorageError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, created_at, updated_at
                 FROM conversations
                 WHERE user_id = ?1
                 ORDER BY updated_at DESC",
            )?;

            let rows = stmt.query_map(rusqlite::params![user_id], |row| {
                Ok(row_to_summary(row))
            })?;

            let mut summaries = Vec::new();
            for row in rows {
                summaries.push(row??);
            }
            Ok(summaries)
        })
    }

    fn create(&self, conversation: &Conversation) -> Result<(), StorageError> {
        let turns = encode_turns(&conversation.turns)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO conversations (id, user_id, title, model, turns, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    conversation.id.to_string(),
                    conversation.user_id,
                    conversation.title,
                    conversation.model,
                    turns,
                    conversation.created_at.timestamp_millis(),
                    conversation.updated_at.timestamp_millis(),
                ],
            )?;
            Ok(())
        })
    }

    fn update(&self, conversation: &Conversation) -> Result<bool, StorageError> {
        let turns = encode_turns(&conversation.turns)?;
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE conversations
                 SET title = ?3, model = ?4, turns = ?5, updated_at = ?6
                 WHERE id = ?1 AND user_id = ?2",
                rusqlite::params![
                    conversation.id.to_string(),
                    conversation.user_id,
                    conversation.title,
                    conversation.model,
                    turns,
                    conversation.updated_at.timestamp_millis(),
                ],
            )?;
            Ok(changed > 0)
        })
    }

    fn delete_one(&self, id: Uuid, user_id: &str) -> Result<bool, StorageError> {
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM conversations WHERE id = ?1 AND user_id = ?2",
                rusqlite::params![id.to_string(), user_id],
            )?;
            Ok(changed > 0)
        })
    }

    fn delete_all_for_owner(&self, user_id: &str) -> Result<u64, StorageError> {
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM conversations WHERE user_id = ?1",
                rusqlite::params![user_id],
            )?;
            Ok(changed as u64)
        })
    }
}

// =============================================================================
// Row mapping
// =============================================================================

fn encode_turns(turns: &[Turn]) -> Result<String, StorageError> {
    serde_json::to_string(turns).map_err(|e| StorageError::Corrupt(format!("turns: {}", e)))
}

fn parse_id(raw: &str) -> Result<Uuid, StorageError> {
    Uuid::parse_str(raw).map_err(|e| StorageError::Corrupt(format!("invalid UUID: {}", e)))
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
}

fn row_to_conversation(row: &rusqlite::Row<'_>) -> Result<Conversation, StorageError> {
    let id: String = row.get(0)?;
    let turns: String = row.get(4)?;

    Ok(Conversation {
        id: parse_id(&id)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        model: row.get(3)?,
        turns: serde_json::from_str(&turns)
            .map_err(|e| StorageError::Corrupt(format!("turns: {}", e)))?,
        created_at: millis_to_datetime(row.get(5)?),
        updated_at: millis_to_datetime(row.get(6)?),
    })
}

fn row_to_summary(row: &rusqlite::Row<'_>) -> Result<ConversationSummary, StorageError> {
    let id: String = row.get(0)?;
    Ok(ConversationSummary {
        id: parse_id(&id)?,
        title: row.get(1)?,
        created_at: millis_to_datetime(row.get(2)?),
        updated_at: millis_to_datetime(row.get(3)?),
    })
}

/// Extension trait for rusqlite to support optional query results.
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalExt<T> for Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use parley_core::types::{Attachment, Role, DEFAULT_TITLE};

    fn make_store() -> SqliteConversationStore {
        SqliteConversationStore::new(Arc::new(Database::in_memory().unwrap()))
    }

    fn make_conversation(user: &str) -> Conversation {
        Conversation::new(user, DEFAULT_TITLE, "gemini-2.5-flash")
    }

    #[test]
    fn test_create_and_find() {
        let store = make_store();
        let conv = make_conversation("alice");
        store.create(&conv).unwrap();

        let found = store.find_by_id_and_owner(conv.id, "alice").unwrap().unwrap();
        assert_eq!(found.id, conv.id);
        assert_eq!(found.title, DEFAULT_TITLE);
        assert_eq!(found.model, "gemini-2.5-flash");
        assert!(found.turns.is_empty());
        assert_eq!(
            found.created_at.timestamp_millis(),
            conv.created_at.timestamp_millis()
        );
    }

    #[test]
    fn test_find_nonexistent() {
        let store = make_store();
        assert!(store
            .find_by_id_and_owner(Uuid::new_v4(), "alice")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_other_owner_cannot_see_conversation() {
        let store = make_store();
        let conv = make_conversation("alice");
        store.create(&conv).unwrap();

        assert!(store.find_by_id_and_owner(conv.id, "bob").unwrap().is_none());
        assert!(!store.delete_one(conv.id, "bob").unwrap());
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_update_replaces_turns_and_title() {
        let store = make_store();
        let mut conv = make_conversation("alice");
        store.create(&conv).unwrap();

        conv.push_turn(Turn::user(
            "what is in this picture?",
            vec![Attachment {
                filename: "1700-cat.png".into(),
                original_name: "cat.png".into(),
                mime_type: "image/png".into(),
                size: 10,
                url: "/uploads/1700-cat.png".into(),
            }],
        ));
        conv.push_turn(Turn::model("A cat."));
        conv.apply_title_from("what is in this picture?");
        assert!(store.update(&conv).unwrap());

        let found = store.find_by_id_and_owner(conv.id, "alice").unwrap().unwrap();
        assert_eq!(found.title, "what is in this picture?");
        assert_eq!(found.turns.len(), 2);
        assert_eq!(found.turns[0].role, Role::User);
        assert_eq!(found.turns[0].attachments[0].original_name, "cat.png");
        assert_eq!(found.turns[1].role, Role::Model);
        assert_eq!(found.turns[1].content, "A cat.");
    }

    #[test]
    fn test_update_missing_returns_false() {
        let store = make_store();
        let conv = make_conversation("alice");
        assert!(!store.update(&conv).unwrap());
    }

    #[test]
    fn test_list_sorted_by_updated_desc() {
        let store = make_store();
        let now = Utc::now();

        let mut older = make_conversation("alice");
        older.title = "older".into();
        older.updated_at = now - Duration::minutes(10);
        let mut newer = make_conversation("alice");
        newer.title = "newer".into();
        newer.updated_at = now;
        let other = make_conversation("bob");

        store.create(&older).unwrap();
        store.create(&newer).unwrap();
        store.create(&other).unwrap();

        let list = store.list_for_owner("alice").unwrap();
        let titles: Vec<_> = list.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["newer", "older"]);
    }

    #[test]
    fn test_delete_one() {
        let store = make_store();
        let conv = make_conversation("alice");
        store.create(&conv).unwrap();

        assert!(store.delete_one(conv.id, "alice").unwrap());
        assert!(!store.delete_one(conv.id, "alice").unwrap());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_delete_all_for_owner_leaves_others() {
        let store = make_store();
        store.create(&make_conversation("alice")).unwrap();
        store.create(&make_conversation("alice")).unwrap();
        store.create(&make_conversation("bob")).unwrap();

        assert_eq!(store.delete_all_for_owner("alice").unwrap(), 2);
        assert!(store.list_for_owner("alice").unwrap().is_empty());
        assert_eq!(store.list_for_owner("bob").unwrap().len(), 1);
    }

    #[test]
    fn test_corrupt_turns_surface_as_error() {
        let db = Arc::new(Database::in_memory().unwrap());
        let store = SqliteConversationStore::new(db.clone());
        let conv = make_conversation("alice");
        store.create(&conv).unwrap();

        db.with_conn(|conn| {
            conn.execute("UPDATE conversations SET turns = 'not json'", [])?;
            Ok(())
        })
        .unwrap();

        let err = store.find_by_id_and_owner(conv.id, "alice").unwrap_err();
        assert!(matches!(err, StorageError::Corrupt(_)));
    }
}
