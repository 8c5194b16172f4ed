//! sqlite message store.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use super::{StorageError, StorageResult};
use crate::message::{Message, MessageContent, Role};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS conversations (
        id         TEXT PRIMARY KEY,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS messages (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        conversation_id TEXT NOT NULL,
        role            TEXT NOT NULL,
        content         TEXT NOT NULL,
        created_at      TIMESTAMP NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_messages_conversation
        ON messages (conversation_id, id)",
    "CREATE TABLE IF NOT EXISTS customer_account_urls (
        conversation_id TEXT PRIMARY KEY,
        url             TEXT NOT NULL,
        created_at      TIMESTAMP NOT NULL
    )",
];

/// Append-only store for conversation messages plus the per-conversation
/// customer-account URL cache.
///
/// Cloning is cheap; all clones share one connection pool.
#[derive(Debug, Clone)]
pub struct MessageStore {
    pool: SqlitePool,
}

impl MessageStore {
    /// Open (creating if missing) the database at `url` and ensure the
    /// schema exists.
    pub async fn connect(url: &str) -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StorageError::InvalidUrl {
                url: url.to_string(),
                message: e.to_string(),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> StorageResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Append one message to a conversation, creating the conversation row
    /// on first write and bumping its `updated_at`.
    pub async fn save_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: &MessageContent,
    ) -> StorageResult<()> {
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO conversations (id, created_at, updated_at) VALUES (?1, ?2, ?2)
             ON CONFLICT(id) DO UPDATE SET updated_at = excluded.updated_at",
        )
        .bind(conversation_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "INSERT INTO messages (conversation_id, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(conversation_id)
        .bind(role.as_str())
        .bind(content.to_stored())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Full ordered history for a conversation. Unknown ids yield an empty
    /// list, not an error.
    pub async fn conversation_history(
        &self,
        conversation_id: &str,
    ) -> StorageResult<Vec<Message>> {
        let rows: Vec<(String, String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT role, content, created_at FROM messages
             WHERE conversation_id = ?1 ORDER BY id",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        let messages = rows
            .into_iter()
            .map(|(role, content, created_at)| {
                let role = Role::parse(&role).unwrap_or_else(|| {
                    tracing::warn!(%role, "unknown stored role, treating as user");
                    Role::User
                });
                Message {
                    role,
                    content: MessageContent::from_stored(&content),
                    created_at,
                }
            })
            .collect();

        Ok(messages)
    }

    /// Cached customer-account URL for a conversation, if one was stored.
    pub async fn customer_account_url(
        &self,
        conversation_id: &str,
    ) -> StorageResult<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT url FROM customer_account_urls WHERE conversation_id = ?1",
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(url,)| url))
    }

    /// Store (or replace) the customer-account URL for a conversation.
    pub async fn store_customer_account_url(
        &self,
        conversation_id: &str,
        url: &str,
    ) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO customer_account_urls (conversation_id, url, created_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(conversation_id) DO UPDATE SET url = excluded.url",
        )
        .bind(conversation_id)
        .bind(url)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ContentBlock;
    use serde_json::json;

    async fn memory_store() -> MessageStore {
        MessageStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_plain_text_message_round_trip() {
        let store = memory_store().await;
        let content = MessageContent::Text("where is my order?".to_string());

        store.save_message("conv-1", Role::User, &content).await.unwrap();

        let history = store.conversation_history("conv-1").await.unwrap();
        assert_eq!(history.len(), 1);
        let last = history.last().unwrap();
        assert_eq!(last.role, Role::User);
        assert_eq!(last.content, content);
    }

    #[tokio::test]
    async fn test_structured_message_round_trip() {
        let store = memory_store().await;
        let content = MessageContent::Blocks(vec![
            ContentBlock::text("checking"),
            ContentBlock::ToolUse {
                id: "toolu_1".into(),
                name: "get_order_status".into(),
                input: json!({"order_id": "1001"}),
            },
        ]);

        store
            .save_message("conv-2", Role::Assistant, &content)
            .await
            .unwrap();

        let history = store.conversation_history("conv-2").await.unwrap();
        assert_eq!(history.last().unwrap().content, content);
        assert_eq!(history.last().unwrap().role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_history_is_append_ordered() {
        let store = memory_store().await;
        for i in 0..5 {
            store
                .save_message("conv-3", Role::User, &MessageContent::Text(format!("m{i}")))
                .await
                .unwrap();
        }

        let history = store.conversation_history("conv-3").await.unwrap();
        let texts: Vec<String> = history.iter().map(|m| m.content.plain_text()).collect();
        assert_eq!(texts, vec!["m0", "m1", "m2", "m3", "m4"]);
    }

    #[tokio::test]
    async fn test_unknown_conversation_yields_empty_history() {
        let store = memory_store().await;
        let history = store.conversation_history("never-seen").await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_customer_account_url_cache() {
        let store = memory_store().await;
        assert_eq!(store.customer_account_url("conv-4").await.unwrap(), None);

        store
            .store_customer_account_url("conv-4", "https://shop.example.com/customer/mcp")
            .await
            .unwrap();
        assert_eq!(
            store.customer_account_url("conv-4").await.unwrap().as_deref(),
            Some("https://shop.example.com/customer/mcp")
        );

        // Replacement keeps the latest value.
        store
            .store_customer_account_url("conv-4", "https://other.example.com/mcp")
            .await
            .unwrap();
        assert_eq!(
            store.customer_account_url("conv-4").await.unwrap().as_deref(),
            Some("https://other.example.com/mcp")
        );
    }
}
