//! Periodic live-view frames for one facade.
//!
//! Each call to [`stream_live_frames`] spawns its own producer task that asks a
//! [`FrameSource`] for a frame once per [`FRAME_INTERVAL`] and hands it to the
//! consumer. The producer stops when the consumer cancels, drops the stream, or
//! the parent token (hub shutdown) fires.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::ws::{BroadcastMessage, FacadeId};

pub const FRAME_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveFrame {
    pub facade_id: FacadeId,
    /// Base64-encoded image bytes.
    pub data: String,
}

impl From<LiveFrame> for BroadcastMessage {
    fn from(frame: LiveFrame) -> Self {
        BroadcastMessage::Frame { data: frame.data }
    }
}

/// Produces the current picture of a facade on demand.
pub trait FrameSource: Send + Sync + 'static {
    fn capture(&self, facade_id: FacadeId) -> LiveFrame;
}

// 1x1 transparent PNG.
const PLACEHOLDER_PNG: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f, 0x15, 0xc4,
    0x89, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4e, 0x44, 0xae,
    0x42, 0x60, 0x82,
];

/// Stand-in until displays can report what they show: the same image for
/// every facade.
#[derive(Debug, Clone)]
pub struct PlaceholderFrameSource {
    encoded: String,
}

impl PlaceholderFrameSource {
    pub fn new() -> Self {
        Self {
            encoded: STANDARD.encode(PLACEHOLDER_PNG),
        }
    }
}

impl Default for PlaceholderFrameSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for PlaceholderFrameSource {
    fn capture(&self, facade_id: FacadeId) -> LiveFrame {
        LiveFrame {
            facade_id,
            data: self.encoded.clone(),
        }
    }
}

/// Consumer side of a live frame stream. Dropping it stops the producer.
#[derive(Debug)]
pub struct LiveFrames {
    rx: mpsc::Receiver<LiveFrame>,
    token: CancellationToken,
    _guard: DropGuard,
}

impl LiveFrames {
    /// Next frame, or `None` once the stream was cancelled.
    pub async fn next(&mut self) -> Option<LiveFrame> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            frame = self.rx.recv() => frame,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Start producing frames for `facade_id`, one per [`FRAME_INTERVAL`].
/// Cancelling `parent` ends the stream as well.
pub fn stream_live_frames(
    parent: &CancellationToken,
    facade_id: FacadeId,
    source: Arc<dyn FrameSource>,
) -> LiveFrames {
    let token = parent.child_token();
    // Capacity 1: a frame is produced only when the previous one was taken.
    let (tx, rx) = mpsc::channel(1);

    let producer_token = token.clone();
    tokio::spawn(async move {
        let mut ticker = interval(FRAME_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately; the first frame is due after one interval.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = producer_token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let frame = source.capture(facade_id);
            tokio::select! {
                biased;
                _ = producer_token.cancelled() => break,
                sent = tx.send(frame) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::debug!(facade_id, "Live frame producer stopped");
    });

    LiveFrames {
        rx,
        _guard: token.clone().drop_guard(),
        token,
    }
}
