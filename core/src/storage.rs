//! Local persistence: a flat key-value store and the game/message mirror on top of it

use std::collections::HashMap;
use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{ChatMessage, Game};

pub const GAMES_KEY: &str = "glorp-games";
pub const MESSAGES_KEY: &str = "glorp-messages";

/// Durable string store. Writes replace the previous value for the key.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

// ============================================================================
// SQLite
// ============================================================================

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(data_dir: &Path, file_name: &str) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let conn = Connection::open(data_dir.join(file_name))?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let value = conn
            .query_row("SELECT value FROM settings WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(())
    }
}

// ============================================================================
// In-memory
// ============================================================================

#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values.lock().remove(key);
        Ok(())
    }
}

// ============================================================================
// Mirror
// ============================================================================

/// JSON-encoded copy of the roster and message list.
///
/// Storage problems are logged and never propagate: reads fall back to empty
/// collections and failed writes leave the in-memory state authoritative.
pub struct PersistenceMirror {
    store: Box<dyn KeyValueStore>,
    games_key: String,
    messages_key: String,
}

impl PersistenceMirror {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self::with_keys(store, GAMES_KEY, MESSAGES_KEY)
    }

    pub fn with_keys(store: Box<dyn KeyValueStore>, games_key: &str, messages_key: &str) -> Self {
        Self {
            store,
            games_key: games_key.to_string(),
            messages_key: messages_key.to_string(),
        }
    }

    pub fn load(&self) -> (Vec<Game>, Vec<ChatMessage>) {
        let games = self.load_collection(&self.games_key);
        let messages = self.load_collection(&self.messages_key);
        debug!(games = games.len(), messages = messages.len(), "loaded local state");
        (games, messages)
    }

    pub fn save_games(&self, games: &[Game]) {
        self.save_collection(&self.games_key, games);
    }

    pub fn save_messages(&self, messages: &[ChatMessage]) {
        self.save_collection(&self.messages_key, messages);
    }

    pub fn clear(&self) {
        for key in [&self.games_key, &self.messages_key] {
            if let Err(e) = self.store.remove(key) {
                warn!(key = %key, error = %e, "failed to clear stored collection");
            }
        }
    }

    fn load_collection<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        match self.try_load(key) {
            Ok(items) => items,
            Err(e) => {
                warn!(key, error = %e, "stored collection unreadable, starting empty");
                Vec::new()
            }
        }
    }

    fn try_load<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>> {
        match self.store.get(key)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    fn save_collection<T: Serialize>(&self, key: &str, items: &[T]) {
        let result = serde_json::to_string(items)
            .map_err(Error::from)
            .and_then(|json| self.store.set(key, &json));

        if let Err(e) = result {
            warn!(key, error = %e, "failed to persist collection");
        }
    }
}
