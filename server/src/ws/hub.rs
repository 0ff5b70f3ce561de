//! Fan-out of broadcast messages to registered sockets.
//!
//! Delivery is best effort. Each recipient gets its own bounded write attempt;
//! a recipient that fails or misses the deadline is closed and dropped from the
//! registry, and everyone else still gets the message. Callers are never told
//! about individual failures.

use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use axum::extract::ws::Message;

use super::registry::RegistryStats;
use super::{BroadcastMessage, Connection, ConnectionRegistry, FacadeId, Role};

/// Default per-recipient write deadline.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default depth of each connection's outbound queue.
pub const DEFAULT_OUTBOUND_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy)]
pub struct HubSettings {
    pub write_timeout: Duration,
    pub outbound_buffer: usize,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
        }
    }
}

/// Owns the connection registry. Built once in `main` and handed to handlers
/// through `AppState`.
#[derive(Debug, Clone)]
pub struct Hub {
    registry: Arc<ConnectionRegistry>,
    settings: HubSettings,
    shutdown: CancellationToken,
}

impl Hub {
    pub fn new(settings: HubSettings) -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new()),
            settings,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn write_timeout(&self) -> Duration {
        self.settings.write_timeout
    }

    pub fn stats(&self) -> RegistryStats {
        self.registry.stats()
    }

    /// Create a connection handle and register it under `role`.
    /// The returned receiver must be drained by the socket's writer.
    /// Once the hub is shut down the returned connection is already closed
    /// and not left in the registry.
    pub fn open_connection(&self, role: Role) -> (Connection, mpsc::Receiver<Message>) {
        let (conn, rx) = Connection::new(self.settings.outbound_buffer);
        self.registry.register(conn.clone(), role);

        // A shutdown that finished before the insert missed this entry in close_all.
        if self.shutdown.is_cancelled() {
            tracing::debug!(connection_id = %conn.id(), role = %role, "Hub shut down, refusing connection");
            self.registry.unregister(conn.id());
        }
        (conn, rx)
    }

    /// Close and forget a connection. Safe to call more than once.
    pub fn disconnect(&self, conn: &Connection) {
        self.registry.unregister(conn.id());
    }

    pub async fn broadcast_to_facade(&self, facade_id: FacadeId, message: &BroadcastMessage) {
        self.broadcast(Role::FacadeViewer(facade_id), message).await;
    }

    pub async fn broadcast_to_monitors(&self, message: &BroadcastMessage) {
        self.broadcast(Role::Monitor, message).await;
    }

    async fn broadcast(&self, filter: Role, message: &BroadcastMessage) {
        let frame = match message.to_ws_message() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, kind = message.kind(), "Failed to encode broadcast");
                return;
            }
        };

        let recipients = self.registry.snapshot(&filter);
        if recipients.is_empty() {
            tracing::debug!(target_role = %filter, kind = message.kind(), "Broadcast has no recipients");
            return;
        }

        let deadline = self.settings.write_timeout;
        let deliveries = recipients.iter().map(|conn| {
            let frame = frame.clone();
            async move {
                match conn.send(frame, deadline).await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(
                            connection_id = %conn.id(),
                            target_role = %filter,
                            error = %e,
                            "Broadcast delivery failed, dropping connection"
                        );
                        self.registry.unregister(conn.id());
                        false
                    }
                }
            }
        });

        let results = join_all(deliveries).await;
        let delivered = results.iter().filter(|ok| **ok).count();

        tracing::info!(
            target_role = %filter,
            kind = message.kind(),
            recipients = results.len(),
            delivered,
            "Broadcast sent"
        );
    }

    /// Token cancelled by [`Hub::shutdown`]. Long-lived per-request work
    /// (live frame streams) derives child tokens from it.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Close every registered connection and cancel outstanding streams.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        let closed = self.registry.close_all();
        tracing::info!(closed, "Hub shut down");
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(HubSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeliveryError;

    fn text_of(msg: Message) -> serde_json::Value {
        match msg {
            Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("expected text frame, got {:?}", other),
        }
    }

    fn content(src: &str) -> BroadcastMessage {
        BroadcastMessage::ContentUpdate {
            src: src.to_string(),
            start_at: 0,
        }
    }

    #[tokio::test]
    async fn test_broadcast_to_facade_reaches_only_that_facade() {
        let hub = Hub::default();
        let (_a, mut rx_a) = hub.open_connection(Role::FacadeViewer(7));
        let (_b, mut rx_b) = hub.open_connection(Role::FacadeViewer(7));
        let (_c, mut rx_c) = hub.open_connection(Role::FacadeViewer(8));
        let (_m, mut rx_m) = hub.open_connection(Role::Monitor);

        hub.broadcast_to_facade(7, &content("x")).await;

        assert_eq!(text_of(rx_a.try_recv().unwrap())["src"], "x");
        assert_eq!(text_of(rx_b.try_recv().unwrap())["src"], "x");
        assert!(rx_c.try_recv().is_err());
        assert!(rx_m.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failed_recipient_is_dropped_and_others_still_receive() {
        let hub = Hub::default();
        let (a, rx_a) = hub.open_connection(Role::FacadeViewer(7));
        let (b, mut rx_b) = hub.open_connection(Role::FacadeViewer(7));

        hub.broadcast_to_facade(7, &content("x")).await;
        assert_eq!(text_of(rx_b.try_recv().unwrap())["src"], "x");

        // A's writer goes away: its next write fails.
        drop(rx_a);
        hub.broadcast_to_facade(7, &content("y")).await;

        assert_eq!(text_of(rx_b.try_recv().unwrap())["src"], "y");
        assert!(!hub.registry().contains(a.id()));
        assert!(!a.is_open());
        assert!(hub.registry().contains(b.id()));

        let remaining: Vec<_> = hub
            .registry()
            .snapshot(&Role::FacadeViewer(7))
            .iter()
            .map(Connection::id)
            .collect();
        assert_eq!(remaining, vec![b.id()]);
    }

    #[tokio::test]
    async fn test_broadcast_to_monitors() {
        let hub = Hub::default();
        let (_m1, mut rx_m1) = hub.open_connection(Role::Monitor);
        let (_m2, mut rx_m2) = hub.open_connection(Role::Monitor);
        let (_v, mut rx_v) = hub.open_connection(Role::FacadeViewer(1));

        hub.broadcast_to_monitors(&BroadcastMessage::Frame { data: "f".into() }).await;

        assert_eq!(text_of(rx_m1.try_recv().unwrap())["type"], "frame");
        assert_eq!(text_of(rx_m2.try_recv().unwrap())["type"], "frame");
        assert!(rx_v.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_without_recipients_is_noop() {
        let hub = Hub::default();
        hub.broadcast_to_facade(42, &content("nobody")).await;
        assert!(hub.registry().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_recipient_times_out_without_blocking_others() {
        let hub = Hub::new(HubSettings {
            write_timeout: Duration::from_millis(200),
            outbound_buffer: 1,
        });
        let (slow, _rx_slow) = hub.open_connection(Role::FacadeViewer(3));
        let (_fast, mut rx_fast) = hub.open_connection(Role::FacadeViewer(3));

        hub.broadcast_to_facade(3, &content("one")).await;
        assert_eq!(text_of(rx_fast.try_recv().unwrap())["src"], "one");

        // The slow queue is still full from "one"; this send has to time out.
        let started = tokio::time::Instant::now();
        hub.broadcast_to_facade(3, &content("two")).await;

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(text_of(rx_fast.try_recv().unwrap())["src"], "two");
        assert!(!hub.registry().contains(slow.id()));
        assert!(!slow.is_open());
    }

    #[tokio::test]
    async fn test_broadcasts_keep_order_per_connection() {
        let hub = Hub::default();
        let (_a, mut rx_a) = hub.open_connection(Role::FacadeViewer(5));

        for i in 0..10 {
            hub.broadcast_to_facade(5, &content(&i.to_string())).await;
        }
        for i in 0..10 {
            assert_eq!(text_of(rx_a.try_recv().unwrap())["src"], i.to_string());
        }
    }

    #[tokio::test]
    async fn test_shutdown_closes_everything() {
        let hub = Hub::default();
        let (a, _rx_a) = hub.open_connection(Role::Monitor);
        let (b, _rx_b) = hub.open_connection(Role::FacadeViewer(1));

        hub.shutdown();

        assert!(hub.registry().is_empty());
        assert!(!a.is_open());
        assert!(!b.is_open());
        assert!(hub.shutdown_token().is_cancelled());
    }

    #[tokio::test]
    async fn test_connections_opened_after_shutdown_are_refused() {
        let hub = Hub::default();
        hub.shutdown();

        let (late, _rx) = hub.open_connection(Role::FacadeViewer(4));

        assert!(!late.is_open());
        assert!(hub.registry().is_empty());
        assert_eq!(hub.stats().total, 0);

        hub.broadcast_to_facade(4, &content("after")).await;
        assert_eq!(
            late.send(Message::Text("x".into()), Duration::from_millis(10)).await,
            Err(DeliveryError::Closed)
        );
    }
}
