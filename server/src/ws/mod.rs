pub mod actor;
pub mod handler;
pub mod hub;
pub mod protocol;
pub mod registry;

use axum::extract::ws::Message;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use uuid::Uuid;

use crate::error::DeliveryError;

pub use hub::Hub;
pub use protocol::BroadcastMessage;
pub use registry::ConnectionRegistry;

/// Stable identifier of a physical display.
pub type FacadeId = i64;

/// Unique per accepted socket. Two tabs watching the same facade get two ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identity a connection is registered under. Also used as the broadcast filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// A display client (or preview page) following one facade's content.
    FacadeViewer(FacadeId),
    /// Subscribed to the facility-wide playback feed.
    Monitor,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FacadeViewer(id) => write!(f, "facade:{}", id),
            Self::Monitor => f.write_str("monitor"),
        }
    }
}

/// Handle to one open socket.
///
/// Cloning is cheap: every clone shares the outbound queue and the close signal.
/// The socket itself is owned by the connection's actor, whose writer task is
/// the only thing that drains the queue, so writes to one socket never interleave.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    outbound: mpsc::Sender<Message>,
    closed: CancellationToken,
}

impl Connection {
    /// Create a handle plus the receiving end its writer drains.
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<Message>) {
        let (outbound, rx) = mpsc::channel(buffer.max(1));
        let conn = Self {
            id: ConnectionId::new(),
            outbound,
            closed: CancellationToken::new(),
        };
        (conn, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn is_open(&self) -> bool {
        !self.closed.is_cancelled()
    }

    /// Mark the connection closed. The actor notices and tears the socket down.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Resolves once [`Connection::close`] has been called on any clone.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.closed.cancelled()
    }

    /// Queue a frame for the writer, giving up after `deadline`.
    pub async fn send(&self, msg: Message, deadline: Duration) -> Result<(), DeliveryError> {
        if !self.is_open() {
            return Err(DeliveryError::Closed);
        }

        match tokio::time::timeout(deadline, self.outbound.send(msg)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(DeliveryError::Disconnected),
            Err(_) => Err(DeliveryError::Timeout),
        }
    }

    /// Queue a control frame without waiting. Used by the actor itself.
    pub(crate) fn try_send(&self, msg: Message) -> bool {
        self.outbound.try_send(msg).is_ok()
    }
}
