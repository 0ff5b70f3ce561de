use std::sync::Arc;

use crate::db::DbPool;
use crate::live::frames::{FrameSource, PlaceholderFrameSource};
use crate::live::liveness::LivenessTracker;
use crate::ws::hub::{Hub, HubSettings};

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// Registered display and monitor sockets plus fan-out
    pub hub: Hub,
    /// In-memory heartbeat bookkeeping per facade
    pub liveness: Arc<LivenessTracker>,
    /// Where live-view frames come from
    pub frames: Arc<dyn FrameSource>,
}

impl AppState {
    pub fn new(db: DbPool, settings: HubSettings) -> Self {
        Self {
            db,
            hub: Hub::new(settings),
            liveness: Arc::new(LivenessTracker::new()),
            frames: Arc::new(PlaceholderFrameSource::new()),
        }
    }

    pub fn with_frame_source(mut self, frames: Arc<dyn FrameSource>) -> Self {
        self.frames = frames;
        self
    }
}
