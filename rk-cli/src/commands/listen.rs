//! Listen command - mount the notification pipeline and follow it live.

use std::sync::Arc;

use console::style;
use tokio::sync::broadcast::error::RecvError;

use rk_core::config::ConfigHandle;
use rk_core::error::RkResult;
use rk_services::{
    AppEvent, DesktopBackend, EventBus, NotificationAggregator, NotificationCounts,
    NotificationPresenter, NotificationProvider, PushBridge, UnsupportedPushMessaging,
};
use rk_socket::{SocketClient, StoredCredentials, WsConnector};

use crate::OutputFormat;

pub async fn run(config: ConfigHandle, format: OutputFormat) -> RkResult<()> {
    let cfg = config.read().await.clone();
    let store = super::open_store(&config).await?;
    let api = Arc::new(super::create_api_client(&config, store.clone()).await?);

    let bus = EventBus::default();
    let mut events = bus.subscribe();

    let presenter = NotificationPresenter::new(Arc::new(DesktopBackend), cfg.device.os, &cfg.push);
    let aggregator = Arc::new(NotificationAggregator::new(
        api.clone(),
        Arc::new(presenter),
        bus.clone(),
    ));
    let socket = SocketClient::from_config(
        &cfg,
        Arc::new(StoredCredentials::new(store.clone())),
        Arc::new(WsConnector),
    );
    let push = Arc::new(
        PushBridge::new(
            Arc::new(UnsupportedPushMessaging::default()),
            api,
            store,
            cfg.device.clone(),
        )
        .with_event_bus(bus),
    );

    if format == OutputFormat::Text {
        println!(
            "{} Connecting to {}...",
            style("[1/2]").bold().dim(),
            cfg.server.effective_ws_url(cfg.device.os)
        );
    }

    let provider = NotificationProvider::mount(aggregator, socket, push).await;
    provider.socket().on_message(move |message| {
        if format == OutputFormat::Text {
            println!(
                "  {} {}: {}",
                style(format!("[{}]", message.chat_id)).cyan(),
                message.sender.as_ref().map(|s| s.name.as_str()).unwrap_or(&message.sender_id),
                message.content
            );
        }
    });

    if format == OutputFormat::Text {
        println!(
            "{} Listening for notifications... (Ctrl+C to stop)",
            style("[2/2]").bold().dim(),
        );
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(AppEvent::CountsChanged(counts)) => print_counts(&counts, format)?,
                Ok(AppEvent::ConnectionChanged { connected }) => {
                    if format == OutputFormat::Text {
                        let label = if connected {
                            style("connected").green()
                        } else {
                            style("disconnected").yellow()
                        };
                        println!("  {} {label}", style("[socket]").dim());
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => {
                    println!("  {} Missed {n} events (slow consumer)", style("WARN").yellow());
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                if format == OutputFormat::Text {
                    println!();
                    println!("{} Shutting down...", style("--").dim());
                }
                break;
            }
        }
    }

    provider.unmount();
    Ok(())
}

fn print_counts(counts: &NotificationCounts, format: OutputFormat) -> RkResult<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string(counts)?);
        }
        OutputFormat::Text => {
            println!(
                "  {} unread chats: {}, pending bookings: {}",
                style("[counts]").cyan(),
                style(counts.unread_chat_count).bold(),
                style(counts.pending_bookings_count).bold()
            );
        }
    }
    Ok(())
}
