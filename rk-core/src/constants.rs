//! Application-wide constants.

/// Application name.
pub const APP_NAME: &str = "Rentkar";

/// Application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Key-value store key holding the user's auth JWT.
pub const AUTH_TOKEN_KEY: &str = "userToken";

/// Key-value store key holding the last registered push token record.
pub const PUSH_TOKEN_KEY: &str = "@fcm_token";

/// Default number of reconnect attempts before the socket gives up.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Default linear backoff step between reconnect attempts.
pub const DEFAULT_RECONNECT_BASE_DELAY_MS: u64 = 1_000;

/// Default REST request timeout in milliseconds.
pub const DEFAULT_API_TIMEOUT_MS: u64 = 30_000;

/// First Android API level (13) that requires the runtime
/// POST_NOTIFICATIONS permission.
pub const ANDROID_RUNTIME_PERMISSION_API_LEVEL: u32 = 33;

/// Id of the notification channel every local notification is posted to.
pub const DEFAULT_CHANNEL_ID: &str = "default";

/// Human-readable name of the default notification channel.
pub const DEFAULT_CHANNEL_NAME: &str = "Default Channel";

/// Default event bus / dispatcher capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// REST endpoint paths, relative to the API base URL.
pub mod endpoints {
    pub const UNREAD_CHAT_COUNT: &str = "/chats/unread-count";
    pub const PENDING_REQUESTS_COUNT: &str = "/bookings/pending-count";
    pub const FCM_TOKEN: &str = "/users/fcm-token";
}

/// Hosted production endpoints.
pub mod production {
    pub const API_BASE_URL: &str = "https://rentkar-w7j0.onrender.com/api";
    pub const WS_URL: &str = "wss://rentkar-w7j0.onrender.com/ws";
}
