//! One-shot REST reconciliation of the badge counts.

use console::style;

use rk_core::config::ConfigHandle;
use rk_core::error::RkResult;

use crate::OutputFormat;

pub async fn run(config: ConfigHandle, format: OutputFormat) -> RkResult<()> {
    let store = super::open_store(&config).await?;
    let api = super::create_api_client(&config, store).await?;

    let (unread, pending) = tokio::try_join!(api.unread_chat_count(), api.pending_requests_count())?;

    match format {
        OutputFormat::Json => super::print_json(&serde_json::json!({
            "unreadChatCount": unread,
            "pendingBookingsCount": pending,
        })),
        OutputFormat::Text => {
            println!("  Unread chats:     {}", style(unread).bold());
            println!("  Pending bookings: {}", style(pending).bold());
            Ok(())
        }
    }
}
