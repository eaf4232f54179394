//! SQLite-backed key-value store for application state.
//!
//! Holds the suspend mark used by lifecycle recovery, stored as an RFC 3339
//! string under [`SUSPENDED_AT_KEY`].

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::data_dir;
use super::snapshot::SnapshotStore;
use crate::error::{Result, StoreError};

pub const SUSPENDED_AT_KEY: &str = "suspended_at";

/// SQLite database for key-value state.
///
/// The connection sits behind a mutex so the store can be shared with
/// event handlers running on other threads.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `<data_dir>/brainflow.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("brainflow.db");
        Ok(Self::open_at(&path)?)
    }

    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (tests and embedding).
    pub fn open_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        self.conn().execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn().execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Remove a key. Missing keys are fine.
    pub fn kv_delete(&self, key: &str) -> Result<(), StoreError> {
        self.conn()
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

impl SnapshotStore for Database {
    fn save_suspended_at(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.kv_set(SUSPENDED_AT_KEY, &at.to_rfc3339())
    }

    fn load_suspended_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let Some(raw) = self.kv_get(SUSPENDED_AT_KEY)? else {
            return Ok(None);
        };
        DateTime::parse_from_rfc3339(&raw)
            .map(|at| Some(at.with_timezone(&Utc)))
            .map_err(|_| StoreError::Malformed {
                key: SUSPENDED_AT_KEY.to_string(),
                value: raw,
            })
    }

    fn clear_suspended_at(&self) -> Result<(), StoreError> {
        self.kv_delete(SUSPENDED_AT_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
        db.kv_delete("test").unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_delete("test").unwrap();
    }

    #[test]
    fn suspend_mark_roundtrips_through_rfc3339() {
        let db = Database::open_memory().unwrap();
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 15).unwrap();
        db.save_suspended_at(at).unwrap();
        assert_eq!(db.kv_get(SUSPENDED_AT_KEY).unwrap().unwrap(), "2024-03-01T09:30:15+00:00");
        assert_eq!(db.load_suspended_at().unwrap(), Some(at));

        db.clear_suspended_at().unwrap();
        assert!(db.load_suspended_at().unwrap().is_none());
    }

    #[test]
    fn unparsable_mark_is_reported_as_malformed() {
        let db = Database::open_memory().unwrap();
        db.kv_set(SUSPENDED_AT_KEY, "not-a-date").unwrap();
        match db.load_suspended_at() {
            Err(StoreError::Malformed { key, value }) => {
                assert_eq!(key, SUSPENDED_AT_KEY);
                assert_eq!(value, "not-a-date");
            }
            other => panic!("Expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn file_backed_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brainflow.db");
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        Database::open_at(&path).unwrap().save_suspended_at(at).unwrap();
        assert_eq!(Database::open_at(&path).unwrap().load_suspended_at().unwrap(), Some(at));
    }
}
