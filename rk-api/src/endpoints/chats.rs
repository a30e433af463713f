//! Chat endpoints.

use rk_core::constants::endpoints;
use rk_core::error::RkResult;

use crate::client::ApiClient;
use crate::response::CountResponse;

impl ApiClient {
    /// Number of chats with unread messages for the current user.
    pub async fn unread_chat_count(&self) -> RkResult<u64> {
        let resp: CountResponse = self.get_json(endpoints::UNREAD_CHAT_COUNT).await?;
        Ok(resp.count)
    }
}
