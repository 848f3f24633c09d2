//! Persistent (SQLite-file-per-layer) backend — spec.md §4.2.
//!
//! Grounded on `ochra_db::open`/`configure`: WAL mode and a bounded busy
//! timeout are ambient durability hygiene that do not contradict the
//! spec's disclaimed "no strong durability guarantee beyond what the
//! backend provides" — they only avoid gratuitous corruption, not promise
//! anything stronger.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::key::compose_key;
use crate::{Backend, BackendError, Result, StoredEntry};
use buxton_wire::{Param, Value};

pub struct PersistentBackend {
    conn: Connection,
}

impl PersistentBackend {
    /// Open (creating if absent) the SQLite file for one layer's store.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| BackendError::Open {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
        })?;
        configure(&conn)?;
        Ok(PersistentBackend { conn })
    }

    #[cfg(test)]
    pub fn open_temp() -> Self {
        let conn = Connection::open_in_memory().expect("open in-memory sqlite");
        configure(&conn).expect("configure");
        PersistentBackend { conn }
    }
}

fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;
         CREATE TABLE IF NOT EXISTS entries (
             key TEXT PRIMARY KEY,
             value BLOB NOT NULL,
             label TEXT NOT NULL
         );",
    )?;
    Ok(())
}

/// Split a `group\0name` storage key back into its components.
fn split_key(key: &str) -> (String, Option<String>) {
    match key.split_once('\0') {
        Some((group, "")) => (group.to_string(), None),
        Some((group, name)) => (group.to_string(), Some(name.to_string())),
        None => (key.to_string(), None),
    }
}

impl Backend for PersistentBackend {
    fn set(&mut self, group: &str, name: Option<&str>, entry: StoredEntry) -> Result<()> {
        let key = String::from_utf8_lossy(&compose_key(group, name)).into_owned();
        let value_bytes = Param::from_value(&entry.value).encode();
        self.conn.execute(
            "INSERT INTO entries (key, value, label) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, label = excluded.label",
            params![key, value_bytes, entry.label],
        )?;
        Ok(())
    }

    fn get(&self, group: &str, name: Option<&str>) -> Result<StoredEntry> {
        let key = String::from_utf8_lossy(&compose_key(group, name)).into_owned();
        let row: Option<(Vec<u8>, String)> = self
            .conn
            .query_row(
                "SELECT value, label FROM entries WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (value_bytes, label) = row.ok_or(BackendError::NotFound)?;
        let entry = decode_stored_value(&value_bytes)?;
        Ok(StoredEntry::new(entry, label))
    }

    fn unset(&mut self, group: &str, name: Option<&str>) -> Result<()> {
        let key = String::from_utf8_lossy(&compose_key(group, name)).into_owned();
        let changed = self.conn.execute("DELETE FROM entries WHERE key = ?1", params![key])?;
        if changed == 0 {
            return Err(BackendError::NotFound);
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<(String, Option<String>)>> {
        let mut stmt = self.conn.prepare("SELECT key FROM entries")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut keys = Vec::new();
        for row in rows {
            keys.push(split_key(&row?));
        }
        Ok(keys)
    }
}

fn decode_stored_value(bytes: &[u8]) -> Result<Value> {
    Ok(Param::decode(bytes)?.into_value()?)
}
