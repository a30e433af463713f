//! Rentkar Core - Foundation types, error handling, configuration, and logging.
//!
//! This crate provides the shared foundation used by all other Rentkar crates:
//! - Application configuration (endpoints, reconnect policy, device profile)
//! - Global error type covering transport, REST, push, and storage failures
//! - Structured logging with tracing
//! - Platform detection and device OS capabilities
//! - The key-value store abstraction used for credentials and push tokens

pub mod config;
pub mod constants;
pub mod error;
pub mod kv;
pub mod logging;
pub mod platform;

// Re-export commonly used items at the crate root
pub use config::{AppConfig, ConfigHandle};
pub use error::{RkError, RkResult};
pub use kv::{KeyValueStore, MemoryStore};
pub use logging::init_logging;
pub use platform::{DeviceOs, Platform};
