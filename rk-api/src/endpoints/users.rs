//! User endpoints.

use rk_core::constants::endpoints;
use rk_core::error::RkResult;

use crate::client::ApiClient;

impl ApiClient {
    /// Register the device push token for the current user.
    pub async fn register_fcm_token(&self, token: &str) -> RkResult<()> {
        let body = serde_json::json!({ "fcmToken": token });
        self.post(endpoints::FCM_TOKEN, &body).await?;
        Ok(())
    }
}
