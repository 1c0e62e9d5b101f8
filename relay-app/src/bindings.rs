//! Durable conversation → external-thread correlation.
//!
//! At most one backend thread exists per conversation. Callers must hold
//! the conversation lock across resolve-or-create; distinct conversations
//! proceed independently.

use anyhow::{Context, Result};
use dashmap::DashMap;
use relay_bus::ConversationId;
use rusqlite::{Connection, params};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS thread_bindings (
    conversation_id TEXT PRIMARY KEY,
    thread_id       TEXT NOT NULL,
    created_at      TEXT NOT NULL
)";

pub struct ThreadBindings {
    conn: Arc<Mutex<Connection>>,
    locks: DashMap<ConversationId, Arc<AsyncMutex<()>>>,
}

impl ThreadBindings {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create bindings dir {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("open bindings db {}", path.display()))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(SCHEMA, [])?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            locks: DashMap::new(),
        })
    }

    /// Lock serializing resolve-or-create (and the completion that follows)
    /// for one conversation.
    pub fn conversation_lock(&self, conversation: &ConversationId) -> Arc<AsyncMutex<()>> {
        self.locks
            .entry(conversation.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    pub async fn get(&self, conversation: &ConversationId) -> Result<Option<String>> {
        let conn = self.conn.clone();
        let conversation = conversation.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| anyhow::anyhow!("bindings connection poisoned"))?;
            let mut stmt =
                conn.prepare("SELECT thread_id FROM thread_bindings WHERE conversation_id = ?1")?;
            let mut rows = stmt.query(params![conversation.as_str()])?;
            match rows.next()? {
                Some(row) => Ok(Some(row.get(0)?)),
                None => Ok(None),
            }
        })
        .await?
    }

    pub async fn put(&self, conversation: &ConversationId, thread_id: &str) -> Result<()> {
        let conn = self.conn.clone();
        let conversation = conversation.clone();
        let thread_id = thread_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| anyhow::anyhow!("bindings connection poisoned"))?;
            conn.execute(
                "INSERT INTO thread_bindings (conversation_id, thread_id, created_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(conversation_id) DO UPDATE SET thread_id = excluded.thread_id",
                params![
                    conversation.as_str(),
                    thread_id,
                    chrono::Utc::now().to_rfc3339()
                ],
            )?;
            Ok(())
        })
        .await?
    }
}
