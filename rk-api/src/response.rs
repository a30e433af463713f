//! Response body types.
//!
//! The backend answers count endpoints with a bare `{ "count": n }` object
//! and reports failures as `{ "error": "..." }`.

use serde::{Deserialize, Serialize};

/// Body of the badge count endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountResponse {
    /// Missing means zero.
    #[serde(default)]
    pub count: u64,
}

/// Error body returned by the backend on non-2xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    /// Extract the `error` message from a raw body, if it is one.
    pub fn message_from(body: &str) -> Option<String> {
        serde_json::from_str::<ErrorBody>(body)
            .ok()
            .map(|b| b.error)
    }
}
