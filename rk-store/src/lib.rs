//! Local persistence for the Rentkar client.
//!
//! A pooled SQLite database holding a single key-value table. The auth
//! token and the push registration record live here between runs.

pub mod db;
pub mod kv;

pub use db::{Database, DbPool};
pub use kv::SqliteStore;
