//! Message persistence.

use std::future::Future;

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};

use crate::Result;
use crate::model::{Message, MessageStatus};

/// Storage for chat messages.
pub trait MessageStore: Send + Sync {
    /// Persists a message. An id that is already stored is left untouched.
    ///
    /// Returns true if the message was inserted.
    fn save(&self, message: &Message) -> impl Future<Output = Result<bool>> + Send;

    /// Loads every message in the order it was first saved.
    fn load_all(&self) -> impl Future<Output = Result<Vec<Message>>> + Send;

    /// Changes the status of a stored message.
    fn update_status(
        &self,
        id: &str,
        status: MessageStatus,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// `SQLite` message store.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `database_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY NOT NULL,
                arrival INTEGER NOT NULL,
                from_addr TEXT NOT NULL DEFAULT '',
                to_addr TEXT NOT NULL DEFAULT '',
                contact TEXT NOT NULL DEFAULT '',
                chat_address TEXT NOT NULL DEFAULT '',
                content TEXT NOT NULL DEFAULT '',
                sent_date TEXT,
                status TEXT NOT NULL DEFAULT 'delivered'
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_messages_arrival
            ON messages(arrival)
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl MessageStore for SqliteStore {
    async fn save(&self, message: &Message) -> Result<bool> {
        let result = sqlx::query(
            r"
            INSERT OR IGNORE INTO messages
                (id, arrival, from_addr, to_addr, contact, chat_address, content, sent_date, status)
            VALUES (?, (SELECT COALESCE(MAX(arrival), 0) + 1 FROM messages), ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&message.id)
        .bind(&message.from)
        .bind(&message.to)
        .bind(&message.contact)
        .bind(&message.chat_address)
        .bind(&message.content)
        .bind(message.date.map(|d| d.to_rfc3339()))
        .bind(message.status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn load_all(&self) -> Result<Vec<Message>> {
        let rows = sqlx::query(
            r"
            SELECT id, from_addr, to_addr, contact, chat_address, content, sent_date, status
            FROM messages
            ORDER BY arrival ASC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_message).collect())
    }

    async fn update_status(&self, id: &str, status: MessageStatus) -> Result<()> {
        sqlx::query(r"UPDATE messages SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_message(row: &SqliteRow) -> Message {
    let date: Option<String> = row.get("sent_date");
    let status: String = row.get("status");
    Message {
        id: row.get("id"),
        from: row.get("from_addr"),
        to: row.get("to_addr"),
        contact: row.get("contact"),
        chat_address: row.get("chat_address"),
        content: row.get("content"),
        date: date
            .and_then(|d| DateTime::parse_from_rfc3339(&d).ok())
            .map(|d| d.with_timezone(&Utc)),
        status: MessageStatus::parse(&status),
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn message(id: &str) -> Message {
        Message {
            id: id.into(),
            from: "a@x.org".into(),
            to: "b@x.org".into(),
            contact: "A".into(),
            chat_address: "a@x.org".into(),
            content: format!("body {id}"),
            date: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single(),
            status: MessageStatus::Delivered,
        }
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut undated = message("<2@x>");
        undated.date = None;

        assert!(store.save(&message("<1@x>")).await.unwrap());
        assert!(store.save(&undated).await.unwrap());

        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded, vec![message("<1@x>"), undated]);
    }

    #[tokio::test]
    async fn test_duplicate_id_is_ignored() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert!(store.save(&message("<1@x>")).await.unwrap());

        let mut changed = message("<1@x>");
        changed.content = "different".into();
        assert!(!store.save(&changed).await.unwrap());

        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].content, "body <1@x>");
    }

    #[tokio::test]
    async fn test_load_keeps_arrival_order() {
        let store = SqliteStore::in_memory().await.unwrap();
        for id in ["z", "a", "m"] {
            store.save(&message(id)).await.unwrap();
        }
        let ids: Vec<String> = store
            .load_all()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["z", "a", "m"]);
    }

    #[tokio::test]
    async fn test_update_status() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.save(&message("1")).await.unwrap();
        store.update_status("1", MessageStatus::Failed).await.unwrap();
        assert_eq!(
            store.load_all().await.unwrap()[0].status,
            MessageStatus::Failed
        );
    }
}
