//! `KeyValueStore` backed by the `kv` table.

use rusqlite::params;

use rk_core::error::{RkError, RkResult};
use rk_core::kv::KeyValueStore;

use crate::db::Database;

/// Persistent key-value store.
#[derive(Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// All keys currently stored, sorted.
    pub fn keys(&self) -> RkResult<Vec<String>> {
        let conn = self.db.conn()?;
        let mut stmt = conn
            .prepare("SELECT key FROM kv ORDER BY key")
            .map_err(|e| RkError::Database(e.to_string()))?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| RkError::Database(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(keys)
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> RkResult<Option<String>> {
        let conn = self.db.conn()?;
        match conn.query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
            row.get::<_, String>(0)
        }) {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(RkError::Database(e.to_string())),
        }
    }

    fn set(&self, key: &str, value: &str) -> RkResult<()> {
        let conn = self.db.conn()?;
        conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                            updated_at = strftime('%s', 'now')",
            params![key, value],
        )
        .map_err(|e| RkError::Database(e.to_string()))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> RkResult<bool> {
        let conn = self.db.conn()?;
        let changed = conn
            .execute("DELETE FROM kv WHERE key = ?1", [key])
            .map_err(|e| RkError::Database(e.to_string()))?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rk_core::config::StorageConfig;
    use tempfile::TempDir;

    #[test]
    fn test_upsert_and_delete() {
        let store = SqliteStore::new(Database::in_memory().unwrap());
        assert_eq!(store.get("userToken").unwrap(), None);

        store.set("userToken", "a").unwrap();
        store.set("userToken", "b").unwrap();
        assert_eq!(store.get("userToken").unwrap().as_deref(), Some("b"));
        assert_eq!(store.keys().unwrap(), vec!["userToken".to_string()]);

        assert!(store.remove("userToken").unwrap());
        assert!(!store.remove("userToken").unwrap());
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rentkar.db");
        let config = StorageConfig::default();

        {
            let store = SqliteStore::new(Database::init(&path, &config).unwrap());
            store.set("@fcm_token", r#"{"fcm_token":"t"}"#).unwrap();
        }

        let store = SqliteStore::new(Database::init(&path, &config).unwrap());
        assert_eq!(
            store.get("@fcm_token").unwrap().as_deref(),
            Some(r#"{"fcm_token":"t"}"#)
        );
    }
}
