//! JSON messages pushed to display and monitor clients.
//!
//! Every message is an object with a `type` discriminator:
//! - `content_update`: `{ "src": ..., "startAt": <epoch millis> }`
//! - `frame`: `{ "data": <base64 image> }`
//! - `play_event`: `{ "event": { ...play event fields } }`

use axum::extract::ws::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::PlayEvent;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BroadcastMessage {
    /// Tells a display to switch to new media, aligned on `start_at`.
    ContentUpdate {
        src: String,
        #[serde(rename = "startAt")]
        start_at: i64,
    },
    /// One captured frame of a facade's live view.
    Frame { data: String },
    /// A playback was recorded somewhere in the network.
    PlayEvent { event: PlayEvent },
}

impl BroadcastMessage {
    pub fn content_update(src: impl Into<String>, start_at: DateTime<Utc>) -> Self {
        Self::ContentUpdate {
            src: src.into(),
            start_at: start_at.timestamp_millis(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ContentUpdate { .. } => "content_update",
            Self::Frame { .. } => "frame",
            Self::PlayEvent { .. } => "play_event",
        }
    }

    /// Serialize into a text frame.
    pub fn to_ws_message(&self) -> Result<Message, serde_json::Error> {
        let text = serde_json::to_string(self)?;
        Ok(Message::Text(text.into()))
    }
}
