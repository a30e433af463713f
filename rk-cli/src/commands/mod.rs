//! CLI command implementations.

pub mod auth;
pub mod config;
pub mod counts;
pub mod listen;
pub mod send;

use std::sync::Arc;

use serde::Serialize;

use rk_api::{ApiClient, AuthSource};
use rk_core::config::ConfigHandle;
use rk_core::error::RkResult;
use rk_store::{Database, SqliteStore};

/// Open the local key-value store from config.
pub async fn open_store(config: &ConfigHandle) -> RkResult<Arc<SqliteStore>> {
    let cfg = config.read().await;
    let path = cfg.effective_storage_path()?;
    let db = Database::init(&path, &cfg.storage)?;
    Ok(Arc::new(SqliteStore::new(db)))
}

/// API client that reads the stored auth token on every request.
pub async fn create_api_client(config: &ConfigHandle, store: Arc<SqliteStore>) -> RkResult<ApiClient> {
    let cfg = config.read().await;
    Ok(ApiClient::from_config(&cfg)?.with_auth(AuthSource::Store(store)))
}

/// Print a value as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> RkResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
