//! Storage for chat sessions, message history and the webhook override
//!
//! The relay only talks to the [`SessionStore`] and [`ConfigStore`] traits.
//! [`MemoryStore`] backs tests and database-less deployments; [`PgStore`]
//! persists to PostgreSQL.

use crate::{
    config::DatabaseConfig,
    error::AppError,
    types::{ChatMessage, ChatSession, Sender},
    Result,
};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::time::Duration;
use tracing::info;

/// Upper bound on messages returned for one session.
pub const MESSAGE_HISTORY_LIMIT: usize = 1000;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, session: ChatSession) -> Result<ChatSession>;
    async fn find_session(&self, id: &str) -> Result<Option<ChatSession>>;
    async fn save_message(&self, message: ChatMessage) -> Result<()>;
    /// Messages oldest first, capped at [`MESSAGE_HISTORY_LIMIT`].
    async fn list_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>>;
}

#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get_override_url(&self) -> Result<Option<String>>;
    /// Replace the override in one step; readers see the old or the new value.
    async fn set_override_url(&self, url: String) -> Result<()>;
    async fn clear_override_url(&self) -> Result<()>;
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

#[derive(Default)]
pub struct MemoryStore {
    sessions: DashMap<String, ChatSession>,
    messages: DashMap<String, Vec<ChatMessage>>,
    override_url: RwLock<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(&self, session: ChatSession) -> Result<ChatSession> {
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn find_session(&self, id: &str) -> Result<Option<ChatSession>> {
        Ok(self.sessions.get(id).map(|s| s.value().clone()))
    }

    async fn save_message(&self, message: ChatMessage) -> Result<()> {
        self.messages
            .entry(message.session_id.clone())
            .or_default()
            .push(message);
        Ok(())
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        let mut messages = self
            .messages
            .get(session_id)
            .map(|m| m.value().clone())
            .unwrap_or_default();
        messages.sort_by_key(|m| m.timestamp);
        messages.truncate(MESSAGE_HISTORY_LIMIT);
        Ok(messages)
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn get_override_url(&self) -> Result<Option<String>> {
        Ok(self.override_url.read().clone())
    }

    async fn set_override_url(&self, url: String) -> Result<()> {
        *self.override_url.write() = Some(url);
        Ok(())
    }

    async fn clear_override_url(&self) -> Result<()> {
        *self.override_url.write() = None;
        Ok(())
    }
}

// ============================================================================
// POSTGRES STORE
// ============================================================================

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS chat_sessions (
        id TEXT PRIMARY KEY,
        user_name TEXT NOT NULL,
        user_email TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS chat_messages (
        id TEXT PRIMARY KEY,
        session_id TEXT NOT NULL REFERENCES chat_sessions(id),
        message TEXT NOT NULL,
        sender TEXT NOT NULL,
        timestamp TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS chat_messages_session_idx ON chat_messages (session_id, timestamp)",
    r#"
    CREATE TABLE IF NOT EXISTS webhook_config (
        id SMALLINT PRIMARY KEY CHECK (id = 1),
        webhook_url TEXT NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
];

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Initializing database connection pool");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .connect(&config.url)
            .await
            .map_err(|e| {
                AppError::configuration(format!("Failed to connect to database: {}", e))
            })?;

        let store = Self { pool };
        store.init_schema().await?;

        info!("Database connection pool initialized successfully");
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn create_session(&self, session: ChatSession) -> Result<ChatSession> {
        sqlx::query(
            "INSERT INTO chat_sessions (id, user_name, user_email, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(&session.id)
        .bind(&session.user_name)
        .bind(&session.user_email)
        .bind(session.created_at)
        .execute(&self.pool)
        .await?;
        Ok(session)
    }

    async fn find_session(&self, id: &str) -> Result<Option<ChatSession>> {
        let row = sqlx::query(
            "SELECT id, user_name, user_email, created_at FROM chat_sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(ChatSession {
                id: row.try_get("id")?,
                user_name: row.try_get("user_name")?,
                user_email: row.try_get("user_email")?,
                created_at: row.try_get("created_at")?,
            })),
            None => Ok(None),
        }
    }

    async fn save_message(&self, message: ChatMessage) -> Result<()> {
        sqlx::query(
            "INSERT INTO chat_messages (id, session_id, message, sender, timestamp) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&message.id)
        .bind(&message.session_id)
        .bind(&message.message)
        .bind(message.sender.as_str())
        .bind(message.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT id, session_id, message, sender, timestamp
            FROM chat_messages
            WHERE session_id = $1
            ORDER BY timestamp ASC
            LIMIT $2
            "#,
        )
        .bind(session_id)
        .bind(MESSAGE_HISTORY_LIMIT as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<ChatMessage> {
                let sender: String = row.try_get("sender")?;
                Ok(ChatMessage {
                    id: row.try_get("id")?,
                    session_id: row.try_get("session_id")?,
                    message: row.try_get("message")?,
                    sender: sender.parse::<Sender>().map_err(AppError::internal)?,
                    timestamp: row.try_get("timestamp")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ConfigStore for PgStore {
    async fn get_override_url(&self) -> Result<Option<String>> {
        let row = sqlx::query("SELECT webhook_url FROM webhook_config WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(row.try_get("webhook_url")?)),
            None => Ok(None),
        }
    }

    async fn set_override_url(&self, url: String) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO webhook_config (id, webhook_url, updated_at) VALUES (1, $1, NOW())
            ON CONFLICT (id) DO UPDATE SET webhook_url = EXCLUDED.webhook_url, updated_at = NOW()
            "#,
        )
        .bind(url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear_override_url(&self) -> Result<()> {
        sqlx::query("DELETE FROM webhook_config WHERE id = 1")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
