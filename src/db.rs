//! Persistence for the single active conversation
//!
//! History is stored as ordered rows; settings and state are JSON blobs in a
//! key/value table.

mod schema;

pub use schema::*;

use crate::conversation::{ConversationHistory, Message, Role};
use crate::llm::GenerationParams;
use crate::state_machine::ConversationState;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Corrupt stored value for '{key}': {source}")]
    Corrupt {
        key: String,
        source: serde_json::Error,
    },
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== History ====================

    /// Replace the stored history with `history`
    pub fn save_history(&self, history: &ConversationHistory) -> DbResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM messages", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO messages (id, role, content, is_greeting, is_error)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for message in history.persisted_window() {
                stmt.execute(params![
                    message.id,
                    message.role.as_str(),
                    message.content,
                    message.is_greeting,
                    message.is_error,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn load_history(&self) -> DbResult<ConversationHistory> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, role, content, is_greeting, is_error FROM messages ORDER BY seq",
        )?;
        let messages = stmt
            .query_map([], |row| {
                Ok(Message {
                    id: row.get(0)?,
                    role: parse_role(row.get::<_, String>(1)?.as_str()),
                    content: row.get(2)?,
                    is_greeting: row.get(3)?,
                    is_error: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ConversationHistory::from_messages(messages))
    }

    // ==================== Settings & State ====================

    pub fn save_settings(&self, settings: &GenerationParams) -> DbResult<()> {
        self.put_json(SETTINGS_KEY, settings)
    }

    /// Stored settings, or defaults when none were saved
    pub fn load_settings(&self) -> DbResult<GenerationParams> {
        Ok(self.get_json(SETTINGS_KEY)?.unwrap_or_default())
    }

    pub fn save_state(&self, state: &ConversationState) -> DbResult<()> {
        self.put_json(STATE_KEY, state)
    }

    /// Stored state as it should resume after a restart
    pub fn load_state(&self) -> DbResult<ConversationState> {
        let state: ConversationState = self.get_json(STATE_KEY)?.unwrap_or_default();
        Ok(state.restored())
    }

    fn put_json<T: Serialize>(&self, key: &str, value: &T) -> DbResult<()> {
        let json = serde_json::to_string(value).map_err(|source| DbError::Corrupt {
            key: key.to_string(),
            source,
        })?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> DbResult<Option<T>> {
        let conn = self.conn.lock().unwrap();
        let raw: Option<String> = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        raw.map(|json| {
            serde_json::from_str(&json).map_err(|source| DbError::Corrupt {
                key: key.to_string(),
                source,
            })
        })
        .transpose()
    }
}

fn parse_role(s: &str) -> Role {
    match s {
        "user" => Role::User,
        "system" => Role::System,
        _ => Role::Assistant,
    }
}
