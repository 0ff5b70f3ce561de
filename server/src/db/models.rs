//! Row types for the facade tables.
//! These correspond 1:1 to the SQLite schema defined in migrations.rs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ws::FacadeId;

/// A registered display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facade {
    pub id: FacadeId,
    pub name: String,
    pub city: String,
    pub address: String,
    pub width_cells: i64,
    pub height_cells: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// One heartbeat sample as stored in `facade_heartbeat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub facade_id: FacadeId,
    pub latency_ms: u32,
    pub source_ip: String,
    pub timestamp: DateTime<Utc>,
}

/// Last persisted liveness snapshot for a facade (`facade_status`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedFacadeStatus {
    pub facade_id: FacadeId,
    pub is_online: bool,
    pub last_seen: DateTime<Utc>,
    pub latency_ms: Option<u32>,
}

/// A playback reported by a player. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayEvent {
    pub id: i64,
    pub facade_id: FacadeId,
    pub campaign_id: i64,
    pub slot_id: Option<i64>,
    pub media_url: String,
    pub played_at: DateTime<Utc>,
    pub duration_sec: i64,
    pub resolution_w: i64,
    pub resolution_h: i64,
    pub bitrate_kbps: i64,
    pub sync_latency_ms: i64,
}

/// Fields a player sends when reporting a playback; id and time are assigned
/// by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPlayEvent {
    pub facade_id: FacadeId,
    pub campaign_id: i64,
    #[serde(default)]
    pub slot_id: Option<i64>,
    pub media_url: String,
    #[serde(default)]
    pub duration_sec: i64,
    #[serde(default)]
    pub resolution_w: i64,
    #[serde(default)]
    pub resolution_h: i64,
    #[serde(default)]
    pub bitrate_kbps: i64,
    #[serde(default)]
    pub sync_latency_ms: i64,
}

impl NewPlayEvent {
    pub fn into_event(self, id: i64, played_at: DateTime<Utc>) -> PlayEvent {
        PlayEvent {
            id,
            facade_id: self.facade_id,
            campaign_id: self.campaign_id,
            slot_id: self.slot_id,
            media_url: self.media_url,
            played_at,
            duration_sec: self.duration_sec,
            resolution_w: self.resolution_w,
            resolution_h: self.resolution_h,
            bitrate_kbps: self.bitrate_kbps,
            sync_latency_ms: self.sync_latency_ms,
        }
    }
}
