//! Send one chat message over the socket.

use std::sync::Arc;
use std::time::Duration;

use console::style;
use tracing::warn;

use rk_core::config::ConfigHandle;
use rk_core::error::{RkError, RkResult};
use rk_socket::{ConnectionState, SocketClient, StoredCredentials, WsConnector};

use crate::OutputFormat;

/// How long to wait for the socket to open, reconnects included.
const OPEN_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn run(
    config: ConfigHandle,
    chat_id: String,
    content: String,
    format: OutputFormat,
) -> RkResult<()> {
    let store = super::open_store(&config).await?;
    let socket = {
        let cfg = config.read().await;
        SocketClient::from_config(
            &cfg,
            Arc::new(StoredCredentials::new(store)),
            Arc::new(WsConnector),
        )
    };

    socket.connect().await?;
    let mut state = socket.state_receiver();
    let opened = match tokio::time::timeout(
        OPEN_TIMEOUT,
        state.wait_for(|s| matches!(s, ConnectionState::Open | ConnectionState::Failed)),
    )
    .await
    {
        Ok(Ok(current)) => *current == ConnectionState::Open,
        _ => false,
    };
    if !opened {
        socket.disconnect();
        return Err(RkError::SocketNotConnected);
    }

    let sent = socket.join_chat(&chat_id)
        && socket.send_message(&chat_id, &content)
        && socket.leave_chat(&chat_id);
    if !sent {
        warn!("socket closed while sending to chat {chat_id}");
    }
    // Let the writer flush before closing.
    tokio::time::sleep(Duration::from_millis(200)).await;
    socket.disconnect();

    match format {
        OutputFormat::Json => super::print_json(&serde_json::json!({
            "chatId": chat_id,
            "sent": sent,
        })),
        OutputFormat::Text => {
            if sent {
                println!("{} Sent to chat {chat_id}.", style("OK").green().bold());
                Ok(())
            } else {
                Err(RkError::SocketNotConnected)
            }
        }
    }
}
