//! Notification provider: owns the mount/unmount lifecycle that ties the
//! socket, the push bridge and the aggregator together.
//!
//! Socket callbacks and push callbacks are funnelled into one pump task, so
//! counter updates are applied one at a time. The pump never awaits REST;
//! reconciliation runs on the aggregator's refresh worker.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use rk_socket::{
    BookingNotification, ChatNotification, ConnectionState, ListenerId, NotificationEvent,
    SocketClient,
};

use crate::aggregator::{NotificationAggregator, NotificationCounts};
use crate::event_bus::AppEvent;
use crate::push::{PushBridge, PushMessage, Subscription};

/// Work items for the pump.
#[derive(Debug)]
enum Inbox {
    Chat(ChatNotification),
    Booking(BookingNotification),
    Push(PushMessage),
}

/// Everything attached at mount, released at unmount.
struct Attached {
    notification_listener: ListenerId,
    booking_listener: ListenerId,
    subscriptions: Vec<Subscription>,
    tasks: Vec<JoinHandle<()>>,
}

pub struct NotificationProvider {
    aggregator: Arc<NotificationAggregator>,
    socket: SocketClient,
    push: Arc<PushBridge>,
    attached: Mutex<Option<Attached>>,
}

impl NotificationProvider {
    /// Connect, prepare notifications, wire every listener and kick off the
    /// first count reconciliation.
    pub async fn mount(
        aggregator: Arc<NotificationAggregator>,
        socket: SocketClient,
        push: Arc<PushBridge>,
    ) -> Self {
        aggregator.set_mounted(true);
        let (inbox, rx) = mpsc::unbounded_channel();
        let mut tasks = Vec::with_capacity(3);

        tasks.push(aggregator.spawn_refresh_worker());
        tasks.push(tokio::spawn(pump(aggregator.clone(), rx)));
        tasks.push(tokio::spawn(watch_connection(
            aggregator.clone(),
            socket.clone(),
        )));

        // (a) transport
        if let Err(e) = socket.connect().await {
            warn!("socket connect failed: {e}");
        }

        // (b) channel
        if !aggregator.presenter().create_channel() {
            warn!("notification channel unavailable");
        }

        // (c) push
        if push.register_token().await {
            info!("push notifications ready");
        } else {
            info!("push notifications unavailable, socket only");
        }

        let mut subscriptions = Vec::with_capacity(3);
        let tx = inbox.clone();
        subscriptions.push(push.setup_foreground_handler(move |message| {
            let _ = tx.send(Inbox::Push(message));
        }));
        subscriptions.push(push.setup_token_refresh_listener());
        let bus = aggregator.event_bus().clone();
        subscriptions.push(push.setup_notification_opened_listener(move |message| {
            bus.emit(AppEvent::NotificationOpened(message));
        }));

        if let Some(message) = push.get_initial_notification().await {
            aggregator
                .event_bus()
                .emit(AppEvent::InitialNotification(message));
        }

        // (d) socket listeners
        let tx = inbox.clone();
        let notification_listener = socket.on_notification(move |event| {
            // Booking events reach the dedicated listener below.
            if let NotificationEvent::Chat(chat) = event {
                let _ = tx.send(Inbox::Chat(chat.clone()));
            }
        });
        let tx = inbox.clone();
        let booking_listener = socket.on_booking_notification(move |booking| {
            let _ = tx.send(Inbox::Booking(booking.clone()));
        });

        // (e) first reconciliation
        aggregator.request_refresh();

        debug!("notification provider mounted");
        Self {
            aggregator,
            socket,
            push,
            attached: Mutex::new(Some(Attached {
                notification_listener,
                booking_listener,
                subscriptions,
                tasks,
            })),
        }
    }

    pub fn aggregator(&self) -> &Arc<NotificationAggregator> {
        &self.aggregator
    }

    pub fn socket(&self) -> &SocketClient {
        &self.socket
    }

    pub fn push(&self) -> &Arc<PushBridge> {
        &self.push
    }

    pub fn counts(&self) -> NotificationCounts {
        self.aggregator.counts()
    }

    /// Queue a reconciliation on the refresh worker.
    pub fn request_refresh(&self) {
        if !self.is_mounted() {
            debug!("provider unmounted, refresh dropped");
            return;
        }
        self.aggregator.request_refresh();
    }

    pub fn is_mounted(&self) -> bool {
        self.attached
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Detach everything and disconnect the transport. Safe to call twice.
    pub fn unmount(&self) {
        let attached = match self.attached.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(mut attached) = attached else {
            return;
        };

        self.aggregator.set_mounted(false);

        self.socket.off_booking_notification(attached.booking_listener);
        self.socket.off_notification(attached.notification_listener);

        while let Some(subscription) = attached.subscriptions.pop() {
            subscription.unsubscribe();
        }
        for task in attached.tasks.drain(..) {
            task.abort();
        }

        self.socket.disconnect();
        self.aggregator.set_connection_state(false);
        debug!("notification provider unmounted");
    }
}

impl Drop for NotificationProvider {
    fn drop(&mut self) {
        self.unmount();
    }
}

async fn pump(aggregator: Arc<NotificationAggregator>, mut rx: mpsc::UnboundedReceiver<Inbox>) {
    while let Some(item) = rx.recv().await {
        match item {
            Inbox::Chat(chat) => aggregator.handle_chat_notification(&chat),
            Inbox::Booking(booking) => aggregator.handle_booking_notification(&booking),
            Inbox::Push(message) => aggregator.handle_foreground_push(&message),
        }
    }
}

/// Mirror the transport state into the aggregator and reconcile after
/// every reconnect. The first open is covered by the mount refresh.
async fn watch_connection(aggregator: Arc<NotificationAggregator>, socket: SocketClient) {
    let mut rx = socket.state_receiver();
    let mut seen_open = false;
    let mut state = *rx.borrow_and_update();

    loop {
        let open = state == ConnectionState::Open;
        aggregator.set_connection_state(open);
        if open {
            if seen_open {
                debug!("socket reconnected, reconciling counts");
                aggregator.request_refresh();
            }
            seen_open = true;
        } else if state == ConnectionState::Failed {
            error!("socket gave up reconnecting");
        }

        if rx.changed().await.is_err() {
            break;
        }
        state = *rx.borrow_and_update();
    }
}
