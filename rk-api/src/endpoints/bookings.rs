//! Booking endpoints.

use rk_core::constants::endpoints;
use rk_core::error::RkResult;

use crate::client::ApiClient;
use crate::response::CountResponse;

impl ApiClient {
    /// Number of pending booking requests on items the user owns.
    pub async fn pending_requests_count(&self) -> RkResult<u64> {
        let resp: CountResponse = self.get_json(endpoints::PENDING_REQUESTS_COUNT).await?;
        Ok(resp.count)
    }
}
