//! SQLite-backed conversation store.
//!
//! One row per conversation; the message list and generation parameters
//! are JSON columns, keeping the single-document-per-conversation model.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use palaver_types::{
    Conversation, ConversationId, ConversationSummary, GenerationParams, Message,
    NewConversation, OwnerId,
};

use crate::error::{Result, StoreError};
use crate::store::ConversationStore;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Thin repository over SQLite.
///
/// Thread-safe via internal `Mutex<Connection>`. The per-call work is a
/// single indexed statement, so the synchronous connection is used
/// directly from async context.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and run pending migrations.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

        let mut store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let mut store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&mut self) -> Result<()> {
        let conn = self.conn.get_mut().unwrap();
        embedded::migrations::runner()
            .run(conn)
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        Ok(())
    }

    /// Lock the connection for use. Panics if poisoned.
    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }
}

fn parse_dt(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn find(&self, id: &ConversationId) -> Result<Option<Conversation>> {
        let row = self
            .conn()
            .query_row(
                "SELECT id, owner_id, title, messages, params, updated_at
                 FROM conversations WHERE id = ?1",
                params![id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, owner_id, title, messages, params, updated_at)) = row else {
            return Ok(None);
        };

        Ok(Some(Conversation {
            id: ConversationId(id),
            owner_id: OwnerId(owner_id),
            title,
            messages: serde_json::from_str(&messages)?,
            params: serde_json::from_str(&params)?,
            updated_at: parse_dt(&updated_at),
        }))
    }

    async fn insert(&self, conversation: NewConversation) -> Result<ConversationId> {
        let id = Uuid::new_v4().to_string();
        let now_str = Utc::now().to_rfc3339();

        self.conn().execute(
            "INSERT INTO conversations (id, owner_id, title, messages, params, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                conversation.owner_id.as_str(),
                conversation.title,
                serde_json::to_string(&conversation.messages)?,
                serde_json::to_string(&conversation.params)?,
                now_str
            ],
        )?;

        Ok(ConversationId(id))
    }

    async fn replace_messages(&self, id: &ConversationId, messages: Vec<Message>) -> Result<()> {
        let now_str = Utc::now().to_rfc3339();
        let updated = self.conn().execute(
            "UPDATE conversations SET messages = ?1, updated_at = ?2 WHERE id = ?3",
            params![serde_json::to_string(&messages)?, now_str, id.as_str()],
        )?;

        if updated == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn replace_messages_and_touch(
        &self,
        id: &ConversationId,
        messages: Vec<Message>,
        params: GenerationParams,
    ) -> Result<()> {
        let now_str = Utc::now().to_rfc3339();
        let updated = self.conn().execute(
            "UPDATE conversations SET messages = ?1, params = ?2, updated_at = ?3 WHERE id = ?4",
            params![
                serde_json::to_string(&messages)?,
                serde_json::to_string(&params)?,
                now_str,
                id.as_str()
            ],
        )?;

        if updated == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn delete(&self, id: &ConversationId) -> Result<u64> {
        let removed = self.conn().execute(
            "DELETE FROM conversations WHERE id = ?1",
            params![id.as_str()],
        )?;
        Ok(removed as u64)
    }

    async fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<ConversationSummary>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, title, updated_at FROM conversations
             WHERE owner_id = ?1 ORDER BY updated_at DESC",
        )?;

        let iter = stmt.query_map(params![owner.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut rows = Vec::new();
        for r in iter {
            let (id, title, updated_at) = r?;
            rows.push(ConversationSummary {
                id: ConversationId(id),
                title,
                updated_at: parse_dt(&updated_at),
            });
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palaver_types::{Message, MessageId};

    fn sample(owner: &str, title: &str) -> NewConversation {
        NewConversation {
            owner_id: OwnerId::from(owner),
            title: title.to_string(),
            messages: vec![Message::user("hello")],
            params: GenerationParams::default(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store.insert(sample("u1", "First")).await.unwrap();

        let conv = store.find(&id).await.unwrap().unwrap();
        assert_eq!(conv.title, "First");
        assert_eq!(conv.owner_id, OwnerId::from("u1"));
        assert_eq!(conv.messages.len(), 1);
        assert_eq!(conv.params, GenerationParams::default());
    }

    #[tokio::test]
    async fn test_find_missing_returns_none() {
        let store = SqliteStore::open_in_memory().unwrap();
        let missing = store.find(&ConversationId::from("nope")).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_replace_messages_and_touch() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store.insert(sample("u1", "First")).await.unwrap();
        let before = store.find(&id).await.unwrap().unwrap();

        let mut messages = before.messages.clone();
        messages.push(Message::assistant(MessageId::new(), "hi there", 3, 0.2));
        let params = GenerationParams::for_model("other-model");

        store
            .replace_messages_and_touch(&id, messages, params.clone())
            .await
            .unwrap();

        let after = store.find(&id).await.unwrap().unwrap();
        assert_eq!(after.messages.len(), 2);
        assert_eq!(after.params, params);
        assert!(after.updated_at >= before.updated_at);
    }

    #[tokio::test]
    async fn test_replace_messages_missing_conversation() {
        let store = SqliteStore::open_in_memory().unwrap();
        let result = store
            .replace_messages(&ConversationId::from("nope"), vec![])
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_counts_documents() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store.insert(sample("u1", "First")).await.unwrap();

        assert_eq!(store.delete(&id).await.unwrap(), 1);
        assert_eq!(store.delete(&id).await.unwrap(), 0);
        assert!(store.find(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_by_owner_ordering() {
        let store = SqliteStore::open_in_memory().unwrap();
        let first = store.insert(sample("u1", "First")).await.unwrap();
        let _second = store.insert(sample("u1", "Second")).await.unwrap();
        let _other = store.insert(sample("u2", "Other")).await.unwrap();

        // Touch the first so it becomes the most recent.
        store
            .replace_messages(&first, vec![Message::user("again")])
            .await
            .unwrap();

        let listed = store.list_by_owner(&OwnerId::from("u1")).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, first);
        assert_eq!(listed[0].title, "First");
    }

    #[tokio::test]
    async fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chats.db");
        let store = SqliteStore::open(&path).unwrap();
        let id = store.insert(sample("u1", "Disk")).await.unwrap();
        assert!(store.find(&id).await.unwrap().is_some());
    }
}
