//! Rentkar API - HTTP client for the marketplace REST backend.
//!
//! Only the endpoints the notification pipeline needs are covered: the two
//! badge counts used for reconciliation and push token registration. The
//! client handles bearer authentication, timeouts, and retry with
//! exponential backoff.

pub mod client;
pub mod endpoints;
pub mod response;

pub use client::{ApiClient, AuthSource, RetryConfig};
pub use response::{CountResponse, ErrorBody};
