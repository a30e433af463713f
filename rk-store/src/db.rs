//! Database initialization and connection pooling.
//!
//! Uses SQLite (WAL mode by default) behind an r2d2 pool and runs an
//! integrity check on startup when configured.

use std::path::Path;
use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tracing::{error, info};

use rk_core::config::StorageConfig;
use rk_core::error::{RkError, RkResult};

/// Type alias for the SQLite connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS kv (
    key        TEXT PRIMARY KEY NOT NULL,
    value      TEXT NOT NULL,
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);
";

/// Pooled database handle.
#[derive(Clone)]
pub struct Database {
    pool: Arc<DbPool>,
}

impl Database {
    /// Open (creating if needed) the database at `db_path`.
    pub fn init(db_path: &Path, config: &StorageConfig) -> RkResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("initializing storage at {}", db_path.display());

        let manager = SqliteConnectionManager::file(db_path);
        let db = Self::from_manager(manager, config)?;

        if config.integrity_check_on_startup {
            db.run_integrity_check()?;
        }

        Ok(db)
    }

    /// Open a private in-memory database. Pool size is forced to one since
    /// each in-memory connection would otherwise see its own database.
    pub fn in_memory() -> RkResult<Self> {
        let config = StorageConfig {
            pool_size: 1,
            wal_mode: false,
            ..StorageConfig::default()
        };
        Self::from_manager(SqliteConnectionManager::memory(), &config)
    }

    fn from_manager(manager: SqliteConnectionManager, config: &StorageConfig) -> RkResult<Self> {
        let pool = Pool::builder()
            .max_size(config.pool_size.max(1))
            .connection_customizer(Box::new(ConnectionCustomizer {
                wal_mode: config.wal_mode,
            }))
            .build(manager)
            .map_err(|e| RkError::Pool(e.to_string()))?;

        let db = Self {
            pool: Arc::new(pool),
        };

        db.conn()?
            .execute_batch(CREATE_TABLES)
            .map_err(|e| RkError::Database(e.to_string()))?;

        Ok(db)
    }

    /// Get a connection from the pool.
    pub fn conn(&self) -> RkResult<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| RkError::Pool(e.to_string()))
    }

    /// Run a SQLite integrity check.
    pub fn run_integrity_check(&self) -> RkResult<()> {
        let conn = self.conn()?;
        let result: String = conn
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))
            .map_err(|e| RkError::Database(e.to_string()))?;

        if result != "ok" {
            error!("storage integrity check failed: {result}");
            return Err(RkError::IntegrityCheck(result));
        }

        info!("storage integrity check passed");
        Ok(())
    }
}

/// r2d2 connection customizer that applies PRAGMA settings.
#[derive(Debug)]
struct ConnectionCustomizer {
    wal_mode: bool,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for ConnectionCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        if self.wal_mode {
            conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        }
        conn.execute_batch(
            "PRAGMA synchronous=NORMAL;
             PRAGMA busy_timeout=5000;",
        )?;
        Ok(())
    }
}
