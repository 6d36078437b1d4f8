use crate::domain::notification::{Delivery, UserEvent};
use dashmap::DashMap;
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, UpDownCounter},
};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    sends_total: Counter<u64>,
    active_connections: UpDownCounter<i64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("agora-server");
        Self {
            sends_total: meter
                .u64_counter("agora_notifications_sent_total")
                .with_description("Notification fanout attempts by outcome")
                .build(),
            active_connections: meter
                .i64_up_down_counter("agora_notification_connections")
                .with_description("Number of registered live connections")
                .build(),
        }
    }
}

/// Sending side of one live connection.
#[derive(Clone, Debug)]
pub struct ConnectionHandle {
    pub connection_id: Uuid,
    tx: mpsc::Sender<UserEvent>,
}

impl ConnectionHandle {
    /// Non-blocking emit; a full or closed buffer drops the event.
    fn emit(&self, event: UserEvent) -> Delivery {
        match self.tx.try_send(event) {
            Ok(()) => Delivery::Delivered,
            Err(mpsc::error::TrySendError::Full(_)) => Delivery::Dropped,
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Offline,
        }
    }
}

/// Routing table from user id to that user's single live connection.
///
/// Registering replaces any previous connection for the user (last connection wins);
/// dropping the old sender closes the superseded session's receiver.
#[derive(Clone, Debug)]
pub struct NotificationService {
    connections: Arc<DashMap<Uuid, ConnectionHandle>>,
    buffer_size: usize,
    metrics: Metrics,
}

impl NotificationService {
    #[must_use]
    pub fn new(buffer_size: usize) -> Self {
        Self { connections: Arc::new(DashMap::new()), buffer_size: buffer_size.max(1), metrics: Metrics::new() }
    }

    /// Registers a new live connection for `user_id` and returns its id and event stream.
    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    pub fn register(&self, user_id: Uuid) -> (Uuid, mpsc::Receiver<UserEvent>) {
        let (tx, rx) = mpsc::channel(self.buffer_size);
        let connection_id = Uuid::new_v4();

        if self.connections.insert(user_id, ConnectionHandle { connection_id, tx }).is_some() {
            tracing::debug!("Replaced previous live connection");
        } else {
            self.metrics.active_connections.add(1, &[]);
        }

        (connection_id, rx)
    }

    /// Removes the entry only if it still belongs to `connection_id`, so a superseded session
    /// cannot evict its replacement.
    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    pub fn deregister(&self, user_id: Uuid, connection_id: Uuid) -> bool {
        let removed = self.connections.remove_if(&user_id, |_, handle| handle.connection_id == connection_id).is_some();
        if removed {
            self.metrics.active_connections.add(-1, &[]);
        }
        removed
    }

    #[must_use]
    pub fn lookup(&self, user_id: Uuid) -> Option<ConnectionHandle> {
        self.connections.get(&user_id).map(|entry| entry.value().clone())
    }

    /// Best-effort, at-most-once delivery. Never fails and never waits on the receiver.
    #[tracing::instrument(skip(self, event), fields(user_id = %user_id, event = event.name()))]
    pub fn notify(&self, user_id: Uuid, event: UserEvent) -> Delivery {
        let delivery = self.lookup(user_id).map_or(Delivery::Offline, |handle| handle.emit(event));

        match delivery {
            Delivery::Delivered => tracing::trace!("Event handed to live connection"),
            Delivery::Offline => tracing::debug!("No live connection; event dropped"),
            Delivery::Dropped => tracing::warn!("Outbound buffer full; event dropped"),
        }
        self.metrics.sends_total.add(1, &[KeyValue::new("status", delivery.as_str())]);

        delivery
    }
}
