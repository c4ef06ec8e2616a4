use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::RwLock;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use switchboard_core::Session;

/// Durable session state keyed by session id.
///
/// `put` replaces the whole session in one write, so a session is never
/// observed half-updated.
pub trait SessionStore: Send + Sync {
    fn get(&self, session_id: &str) -> impl Future<Output = Result<Option<Session>>> + Send;
    fn put(&self, session: &Session) -> impl Future<Output = Result<()>> + Send;
    fn delete(&self, session_id: &str) -> impl Future<Output = Result<bool>> + Send;
    fn list_ids(&self) -> impl Future<Output = Result<Vec<String>>> + Send;
    /// Removes sessions idle since before `cutoff`.
    fn purge_idle(&self, cutoff: DateTime<Utc>) -> impl Future<Output = Result<u64>> + Send;
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    async fn get(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.read().get(session_id).cloned())
    }

    async fn put(&self, session: &Session) -> Result<()> {
        self.sessions
            .write()
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        Ok(self.sessions.write().remove(session_id).is_some())
    }

    async fn list_ids(&self) -> Result<Vec<String>> {
        let mut ids = self.sessions.read().keys().cloned().collect::<Vec<_>>();
        ids.sort();
        Ok(ids)
    }

    async fn purge_idle(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut removed = 0_u64;
        self.sessions.write().retain(|_, session| {
            let keep = session.updated_at >= cutoff;
            if !keep {
                removed += 1;
            }
            keep
        });

        Ok(removed)
    }
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .with_context(|| format!("failed connecting to sqlite at {}", database_url))?;

        Self::from_pool(pool).await
    }

    /// Single-connection in-memory database, mostly useful for tests.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("failed opening in-memory sqlite")?;

        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
              session_id TEXT PRIMARY KEY,
              user_id TEXT NOT NULL,
              role TEXT NOT NULL,
              language TEXT NOT NULL,
              updated_at TEXT NOT NULL,
              body_json TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed creating sessions table")?;

        Ok(())
    }
}

impl SessionStore for SqliteStore {
    async fn get(&self, session_id: &str) -> Result<Option<Session>> {
        let row = sqlx::query(
            r#"
            SELECT body_json
            FROM sessions
            WHERE session_id = ?1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed loading session {session_id}"))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let body: String = row.get("body_json");
        let session = serde_json::from_str(&body)
            .with_context(|| format!("corrupt session body for {session_id}"))?;

        Ok(Some(session))
    }

    async fn put(&self, session: &Session) -> Result<()> {
        let body = serde_json::to_string(session)?;

        sqlx::query(
            r#"
            INSERT INTO sessions (session_id, user_id, role, language, updated_at, body_json)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(session_id) DO UPDATE SET
              user_id=excluded.user_id,
              role=excluded.role,
              language=excluded.language,
              updated_at=excluded.updated_at,
              body_json=excluded.body_json
            "#,
        )
        .bind(&session.session_id)
        .bind(&session.user_id)
        .bind(session.role.as_str())
        .bind(session.language.as_code())
        .bind(session.updated_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .bind(body)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed writing session {}", session.session_id))?;

        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE session_id = ?1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_ids(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT session_id FROM sessions ORDER BY session_id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|row| row.get("session_id")).collect())
    }

    async fn purge_idle(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE updated_at < ?1")
            .bind(cutoff.to_rfc3339_opts(SecondsFormat::Micros, true))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[derive(Clone)]
pub enum Store {
    Memory(MemoryStore),
    Sqlite(SqliteStore),
}

impl Store {
    pub fn memory() -> Self {
        Self::Memory(MemoryStore::new())
    }

    pub async fn sqlite(database_url: &str) -> Result<Self> {
        let sqlite = SqliteStore::connect(database_url).await?;
        Ok(Self::Sqlite(sqlite))
    }

    pub fn backend(&self) -> &'static str {
        match self {
            Store::Memory(_) => "memory",
            Store::Sqlite(_) => "sqlite",
        }
    }
}

impl SessionStore for Store {
    async fn get(&self, session_id: &str) -> Result<Option<Session>> {
        match self {
            Store::Memory(store) => store.get(session_id).await,
            Store::Sqlite(store) => store.get(session_id).await,
        }
    }

    async fn put(&self, session: &Session) -> Result<()> {
        match self {
            Store::Memory(store) => store.put(session).await,
            Store::Sqlite(store) => store.put(session).await,
        }
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        match self {
            Store::Memory(store) => store.delete(session_id).await,
            Store::Sqlite(store) => store.delete(session_id).await,
        }
    }

    async fn list_ids(&self) -> Result<Vec<String>> {
        match self {
            Store::Memory(store) => store.list_ids().await,
            Store::Sqlite(store) => store.list_ids().await,
        }
    }

    async fn purge_idle(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        match self {
            Store::Memory(store) => store.purge_idle(cutoff).await,
            Store::Sqlite(store) => store.purge_idle(cutoff).await,
        }
    }
}
