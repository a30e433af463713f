//! Notification aggregator.
//!
//! Holds the badge counters and the socket connection flag. Socket events
//! and foreground pushes bump counters optimistically; REST reconciliation
//! overwrites them and always wins. Counters never go below zero and are
//! never decremented locally.
//!
//! Event handlers never wait on REST. They call `request_refresh`, which
//! wakes the refresh worker; requests made while a refresh is in flight
//! collapse into one follow-up refresh.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use rk_api::ApiClient;
use rk_core::error::RkResult;
use rk_socket::{BookingAction, BookingNotification, ChatNotification};

use crate::event_bus::{AppEvent, EventBus};
use crate::presenter::{notification_data, NotificationPresenter};
use crate::push::PushMessage;

/// Source of truth for the badge counts.
#[async_trait]
pub trait CountsApi: Send + Sync {
    async fn unread_chat_count(&self) -> RkResult<u64>;
    async fn pending_bookings_count(&self) -> RkResult<u64>;
}

#[async_trait]
impl CountsApi for ApiClient {
    async fn unread_chat_count(&self) -> RkResult<u64> {
        ApiClient::unread_chat_count(self).await
    }

    async fn pending_bookings_count(&self) -> RkResult<u64> {
        self.pending_requests_count().await
    }
}

/// Snapshot published to UI consumers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NotificationCounts {
    pub unread_chat_count: u64,
    pub pending_bookings_count: u64,
    pub is_socket_connected: bool,
}

pub struct NotificationAggregator {
    counts_tx: watch::Sender<NotificationCounts>,
    api: Arc<dyn CountsApi>,
    presenter: Arc<NotificationPresenter>,
    event_bus: EventBus,
    mounted: AtomicBool,
    refresh_signal: Notify,
}

impl NotificationAggregator {
    pub fn new(
        api: Arc<dyn CountsApi>,
        presenter: Arc<NotificationPresenter>,
        event_bus: EventBus,
    ) -> Self {
        let (counts_tx, _) = watch::channel(NotificationCounts::default());
        Self {
            counts_tx,
            api,
            presenter,
            event_bus,
            mounted: AtomicBool::new(true),
            refresh_signal: Notify::new(),
        }
    }

    pub fn counts(&self) -> NotificationCounts {
        *self.counts_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<NotificationCounts> {
        self.counts_tx.subscribe()
    }

    pub fn presenter(&self) -> &Arc<NotificationPresenter> {
        &self.presenter
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// Once unmounted, in-flight reconciliations are discarded.
    pub fn set_mounted(&self, mounted: bool) {
        self.mounted.store(mounted, Ordering::SeqCst);
    }

    fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut NotificationCounts),
    {
        let mut changed = false;
        self.counts_tx.send_if_modified(|counts| {
            let before = *counts;
            f(counts);
            changed = *counts != before;
            changed
        });
        if changed {
            self.event_bus.emit(AppEvent::CountsChanged(self.counts()));
        }
    }

    /// Fetch both counts concurrently and overwrite the counters when both
    /// succeed. Returns whether the counters were reconciled.
    pub async fn refresh_counts(&self) -> bool {
        let (chats, bookings) = tokio::join!(
            self.api.unread_chat_count(),
            self.api.pending_bookings_count()
        );

        match (chats, bookings) {
            (Ok(unread), Ok(pending)) => {
                if !self.is_mounted() {
                    debug!("discarding count refresh after unmount");
                    return false;
                }
                self.update(|counts| {
                    counts.unread_chat_count = unread;
                    counts.pending_bookings_count = pending;
                });
                debug!("counts reconciled: unread={unread}, pending={pending}");
                true
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!("error fetching notification counts: {e}");
                false
            }
        }
    }

    /// Ask the refresh worker for a reconciliation without waiting for it.
    pub fn request_refresh(&self) {
        self.refresh_signal.notify_one();
    }

    /// Run reconciliations requested through `request_refresh` until the
    /// returned task is aborted.
    pub fn spawn_refresh_worker(self: &Arc<Self>) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            loop {
                this.refresh_signal.notified().await;
                this.refresh_counts().await;
            }
        })
    }

    pub fn set_connection_state(&self, connected: bool) {
        let mut changed = false;
        self.counts_tx.send_if_modified(|counts| {
            changed = counts.is_socket_connected != connected;
            counts.is_socket_connected = connected;
            changed
        });
        if changed {
            info!("socket connected: {connected}");
            self.event_bus
                .emit(AppEvent::ConnectionChanged { connected });
            self.event_bus.emit(AppEvent::CountsChanged(self.counts()));
        }
    }

    pub fn set_unread_chat_count(&self, count: u64) {
        self.update(|counts| counts.unread_chat_count = count);
    }

    pub fn set_pending_bookings_count(&self, count: u64) {
        self.update(|counts| counts.pending_bookings_count = count);
    }

    pub fn handle_chat_notification(&self, notification: &ChatNotification) {
        self.update(|counts| {
            counts.unread_chat_count = counts.unread_chat_count.saturating_add(1)
        });

        let title = notification.sender_name.as_deref().unwrap_or("New Message");
        let body = notification
            .content
            .as_deref()
            .unwrap_or("You have a new message");
        self.presenter.display_local_notification(
            title,
            body,
            notification_data("new_chat_notification", notification),
        );
    }

    /// Status changes reconcile in the background; the notification is
    /// shown right away.
    pub fn handle_booking_notification(&self, notification: &BookingNotification) {
        let title = notification.item_title.as_deref();
        let (heading, body) = match notification.action {
            BookingAction::NewRequest => {
                self.update(|counts| {
                    counts.pending_bookings_count = counts.pending_bookings_count.saturating_add(1)
                });
                (
                    "New Booking Request",
                    format!("You have a new request for {}", title.unwrap_or("your item")),
                )
            }
            BookingAction::Confirmed => {
                self.request_refresh();
                (
                    "Booking Confirmed!",
                    format!("Your booking for {} has been accepted.", title.unwrap_or("item")),
                )
            }
            BookingAction::Rejected => {
                self.request_refresh();
                (
                    "Booking Rejected",
                    format!(
                        "Your booking request for {} was declined.",
                        title.unwrap_or("item")
                    ),
                )
            }
            BookingAction::Cancelled => {
                self.request_refresh();
                (
                    "Booking Cancelled",
                    format!("The booking for {} was cancelled.", title.unwrap_or("item")),
                )
            }
            BookingAction::Other => {
                debug!("ignoring booking notification with unknown action");
                return;
            }
        };

        self.presenter.display_local_notification(
            heading,
            &body,
            notification_data("booking_notification", notification),
        );
    }

    /// Foreground push: show it when it has a title, then reconcile.
    pub fn handle_foreground_push(&self, message: &PushMessage) {
        if let Some(title) = message.title() {
            self.presenter.display_local_notification(
                title,
                message.body().unwrap_or_default(),
                message.data.clone(),
            );
        }
        self.request_refresh();
    }

    /// Counts are not tracked per chat; opening a chat just reconciles.
    pub async fn mark_chat_as_read(&self, chat_id: &str) {
        debug!("chat {chat_id} read, reconciling counts");
        self.refresh_counts().await;
    }

    pub async fn mark_bookings_viewed(&self) {
        self.refresh_counts().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rk_core::config::PushConfig;
    use rk_core::error::RkError;
    use rk_core::platform::DeviceOs;
    use std::sync::Mutex;

    use crate::presenter::{LocalNotification, NotificationBackend, NotificationChannel};

    struct FixedCounts(Mutex<RkResult<(u64, u64)>>);

    #[async_trait]
    impl CountsApi for FixedCounts {
        async fn unread_chat_count(&self) -> RkResult<u64> {
            match &*self.0.lock().unwrap() {
                Ok((unread, _)) => Ok(*unread),
                Err(_) => Err(RkError::Http("down".into())),
            }
        }

        async fn pending_bookings_count(&self) -> RkResult<u64> {
            match &*self.0.lock().unwrap() {
                Ok((_, pending)) => Ok(*pending),
                Err(_) => Err(RkError::Http("down".into())),
            }
        }
    }

    #[derive(Default)]
    struct Shown(Mutex<Vec<(String, String)>>);

    impl NotificationBackend for Shown {
        fn create_channel(&self, _: &NotificationChannel) -> RkResult<()> {
            Ok(())
        }

        fn display(&self, n: &LocalNotification) -> RkResult<()> {
            self.0.lock().unwrap().push((n.title.clone(), n.body.clone()));
            Ok(())
        }
    }

    fn aggregator(result: RkResult<(u64, u64)>) -> (NotificationAggregator, Arc<Shown>) {
        let shown = Arc::new(Shown::default());
        let presenter = NotificationPresenter::new(shown.clone(), DeviceOs::Ios, &PushConfig::default());
        let agg = NotificationAggregator::new(
            Arc::new(FixedCounts(Mutex::new(result))),
            Arc::new(presenter),
            EventBus::new(16),
        );
        (agg, shown)
    }

    #[tokio::test]
    async fn test_chat_notification_defaults() {
        let (agg, shown) = aggregator(Ok((0, 0)));
        agg.handle_chat_notification(&ChatNotification::default());
        agg.handle_chat_notification(&ChatNotification {
            sender_name: Some("Priya".into()),
            content: Some("Is it free on Sunday?".into()),
            chat_id: Some("c1".into()),
        });

        assert_eq!(agg.counts().unread_chat_count, 2);
        assert_eq!(
            *shown.0.lock().unwrap(),
            vec![
                ("New Message".to_string(), "You have a new message".to_string()),
                ("Priya".to_string(), "Is it free on Sunday?".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_counters() {
        let (agg, _) = aggregator(Err(RkError::Http("down".into())));
        agg.set_unread_chat_count(3);
        assert!(!agg.refresh_counts().await);
        assert_eq!(agg.counts().unread_chat_count, 3);
    }

    #[tokio::test]
    async fn test_refresh_discarded_after_unmount() {
        let (agg, _) = aggregator(Ok((9, 9)));
        agg.set_mounted(false);
        assert!(!agg.refresh_counts().await);
        assert_eq!(agg.counts(), NotificationCounts::default());
    }

    #[tokio::test]
    async fn test_rejected_and_cancelled_texts() {
        let (agg, shown) = aggregator(Ok((0, 0)));
        agg.handle_booking_notification(&BookingNotification {
            action: BookingAction::Rejected,
            item_title: None,
            booking_id: None,
        });
        agg.handle_booking_notification(&BookingNotification {
            action: BookingAction::Cancelled,
            item_title: Some("Drill".into()),
            booking_id: None,
        });
        agg.handle_booking_notification(&BookingNotification {
            action: BookingAction::Other,
            item_title: None,
            booking_id: None,
        });

        assert_eq!(
            *shown.0.lock().unwrap(),
            vec![
                (
                    "Booking Rejected".to_string(),
                    "Your booking request for item was declined.".to_string()
                ),
                (
                    "Booking Cancelled".to_string(),
                    "The booking for Drill was cancelled.".to_string()
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_foreground_push_without_title_only_refreshes() {
        let (agg, shown) = aggregator(Ok((4, 1)));
        let agg = Arc::new(agg);
        let worker = agg.spawn_refresh_worker();
        let mut counts = agg.subscribe();

        agg.handle_foreground_push(&PushMessage::default());
        counts
            .wait_for(|c| c.unread_chat_count == 4 && c.pending_bookings_count == 1)
            .await
            .unwrap();
        assert!(shown.0.lock().unwrap().is_empty());
        worker.abort();
    }

    #[tokio::test]
    async fn test_refresh_requests_without_worker_do_not_block() {
        let (agg, shown) = aggregator(Ok((9, 9)));
        agg.set_pending_bookings_count(2);
        agg.handle_booking_notification(&BookingNotification {
            action: BookingAction::Confirmed,
            item_title: None,
            booking_id: None,
        });
        assert_eq!(shown.0.lock().unwrap().len(), 1);
        assert_eq!(agg.counts().pending_bookings_count, 2);
    }

    #[tokio::test]
    async fn test_connection_flag_emits_event() {
        let (agg, _) = aggregator(Ok((0, 0)));
        let mut rx = agg.event_bus().subscribe();
        agg.set_connection_state(true);
        match rx.recv().await.unwrap() {
            AppEvent::ConnectionChanged { connected } => assert!(connected),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(agg.counts().is_socket_connected);
    }
}
