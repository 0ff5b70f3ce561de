//! Error types shared by the hub, the liveness layer and the storage layer.
//!
//! Connection-level failures ([`DeliveryError`]) are always recovered where they
//! happen. Storage failures travel up to the handler that needed the data.

use crate::ws::FacadeId;

/// The WebSocket handshake for an inbound request did not complete.
#[derive(Debug, thiserror::Error)]
#[error("websocket upgrade failed: {0}")]
pub struct UpgradeError(#[from] pub axum::Error);

/// A single recipient could not be written to.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("connection already closed")]
    Closed,
    #[error("connection writer has gone away")]
    Disconnected,
    #[error("write deadline exceeded")]
    Timeout,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database lock poisoned")]
    LockPoisoned,
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("storage task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("unreadable timestamp {0:?}")]
    Timestamp(String),
}

/// Errors surfaced by live-view queries.
#[derive(Debug, thiserror::Error)]
pub enum LiveError {
    #[error("facade {0} not found")]
    NotFound(FacadeId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl LiveError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        match self {
            Self::NotFound(_) => axum::http::StatusCode::NOT_FOUND,
            Self::Storage(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<LiveError> for (axum::http::StatusCode, String) {
    fn from(err: LiveError) -> Self {
        (err.status_code(), err.to_string())
    }
}

impl From<StorageError> for (axum::http::StatusCode, String) {
    fn from(err: StorageError) -> Self {
        (axum::http::StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}
