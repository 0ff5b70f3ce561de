use axum::{
    extract::{ConnectInfo, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::db::{self, facades, live as store, DbPool};
use crate::db::models::{Heartbeat, NewPlayEvent, PlayEvent, SavedFacadeStatus};
use crate::error::LiveError;
use crate::live::liveness::{FacadeStatus, LivenessTracker};
use crate::state::AppState;
use crate::ws::{BroadcastMessage, FacadeId};

/// Playbacks included in a live view.
pub const RECENT_EVENTS: usize = 20;

// --- Request / response types ---

#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    pub facade_id: FacadeId,
    pub latency_ms: u32,
    #[serde(default)]
    pub source_ip: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LiveView {
    pub status: FacadeStatus,
    pub last: Option<PlayEvent>,
    pub recent: Vec<PlayEvent>,
}

// --- Handlers ---

/// POST /api/live/heartbeat
/// Players report that they are alive and how long the round trip took.
/// The in-memory tracker is authoritative; persistence failures are logged.
pub async fn post_heartbeat(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(req): Json<HeartbeatRequest>,
) -> Json<FacadeStatus> {
    let now = Utc::now();
    let source_ip = req
        .source_ip
        .filter(|ip| !ip.trim().is_empty())
        .unwrap_or_else(|| peer.ip().to_string());

    state
        .liveness
        .record_heartbeat(req.facade_id, req.latency_ms, &source_ip, now);
    let status = state.liveness.status(req.facade_id, now);

    let heartbeat = Heartbeat {
        facade_id: req.facade_id,
        latency_ms: req.latency_ms,
        source_ip,
        timestamp: now,
    };
    if let Err(e) = persist_heartbeat(&state.db, heartbeat, &status).await {
        tracing::error!(facade_id = req.facade_id, error = %e, "Failed to persist heartbeat");
    }

    Json(status)
}

async fn persist_heartbeat(
    db: &DbPool,
    heartbeat: Heartbeat,
    status: &FacadeStatus,
) -> Result<(), crate::error::StorageError> {
    let saved = SavedFacadeStatus {
        facade_id: status.facade_id,
        is_online: status.is_online,
        last_seen: status.last_seen.unwrap_or(heartbeat.timestamp),
        latency_ms: Some(heartbeat.latency_ms),
    };
    db::blocking(db, move |conn| {
        store::insert_heartbeat(conn, &heartbeat)?;
        store::save_facade_status(conn, &saved)
    })
    .await
}

/// POST /api/live/play-event
/// Store a playback and push it to every monitor.
pub async fn post_play_event(
    State(state): State<AppState>,
    Json(req): Json<NewPlayEvent>,
) -> Result<(StatusCode, Json<PlayEvent>), (StatusCode, String)> {
    if req.media_url.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "media_url is required".to_string()));
    }

    let played_at = Utc::now();
    let event = db::blocking(&state.db, move |conn| {
        store::insert_play_event(conn, req, played_at)
    })
    .await?;

    tracing::info!(
        facade_id = event.facade_id,
        campaign_id = event.campaign_id,
        play_id = event.id,
        "Play event recorded"
    );

    state
        .hub
        .broadcast_to_monitors(&BroadcastMessage::PlayEvent {
            event: event.clone(),
        })
        .await;

    Ok((StatusCode::CREATED, Json(event)))
}

/// GET /api/facades/{id}/status
pub async fn get_status(
    State(state): State<AppState>,
    Path(facade_id): Path<FacadeId>,
) -> Json<FacadeStatus> {
    Json(state.liveness.status(facade_id, Utc::now()))
}

/// GET /api/live/online
pub async fn list_online(State(state): State<AppState>) -> Json<Vec<FacadeStatus>> {
    Json(state.liveness.online_facades(Utc::now()))
}

/// GET /api/facades/{id}/live
pub async fn get_live_view(
    State(state): State<AppState>,
    Path(facade_id): Path<FacadeId>,
) -> Result<Json<LiveView>, (StatusCode, String)> {
    let view = load_live_view(&state.db, &state.liveness, facade_id, Utc::now()).await?;
    Ok(Json(view))
}

/// Status plus playback history for a registered facade. History that cannot
/// be read is reported as empty.
pub async fn load_live_view(
    db: &DbPool,
    liveness: &LivenessTracker,
    facade_id: FacadeId,
    now: DateTime<Utc>,
) -> Result<LiveView, LiveError> {
    let exists = db::blocking(db, move |conn| facades::facade_exists(conn, facade_id)).await?;
    if !exists {
        return Err(LiveError::NotFound(facade_id));
    }

    let status = liveness.status(facade_id, now);

    let history = db::blocking(db, move |conn| {
        let last = store::get_last_played(conn, facade_id)?;
        let recent = store::get_recent_events(conn, facade_id, RECENT_EVENTS)?;
        Ok((last, recent))
    })
    .await;

    let (last, recent) = match history {
        Ok(history) => history,
        Err(e) => {
            tracing::warn!(facade_id, error = %e, "Play history unavailable for live view");
            (None, Vec::new())
        }
    };

    Ok(LiveView {
        status,
        last,
        recent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use chrono::{TimeDelta, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap()
    }

    fn play(facade_id: FacadeId, media: &str) -> NewPlayEvent {
        NewPlayEvent {
            facade_id,
            campaign_id: 1,
            slot_id: None,
            media_url: media.to_string(),
            duration_sec: 10,
            resolution_w: 0,
            resolution_h: 0,
            bitrate_kbps: 0,
            sync_latency_ms: 0,
        }
    }

    #[tokio::test]
    async fn test_live_view_unknown_facade_is_not_found() {
        let db = open_in_memory();
        let tracker = LivenessTracker::new();

        let err = load_live_view(&db, &tracker, 404, t0()).await.unwrap_err();
        assert!(matches!(err, LiveError::NotFound(404)));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_live_view_caps_recent_history() {
        let db = open_in_memory();
        let tracker = LivenessTracker::new();
        let facade = {
            let conn = db.lock().unwrap();
            let facade = facades::insert_facade(&conn, "Tower", "Almaty", "", 10, 4, t0()).unwrap();
            for i in 0..25 {
                store::insert_play_event(
                    &conn,
                    play(facade.id, &format!("clip-{}", i)),
                    t0() + TimeDelta::seconds(i),
                )
                .unwrap();
            }
            facade
        };
        tracker.record_heartbeat(facade.id, 30, "10.0.0.1", t0() + TimeDelta::seconds(30));

        let view = load_live_view(&db, &tracker, facade.id, t0() + TimeDelta::seconds(31))
            .await
            .unwrap();

        assert!(view.status.is_online);
        assert_eq!(view.recent.len(), RECENT_EVENTS);
        assert_eq!(view.last.as_ref().map(|e| e.media_url.as_str()), Some("clip-24"));
        assert_eq!(view.recent[0].media_url, "clip-24");
    }

    #[tokio::test]
    async fn test_live_view_without_history() {
        let db = open_in_memory();
        let tracker = LivenessTracker::new();
        let facade_id = {
            let conn = db.lock().unwrap();
            facades::insert_facade(&conn, "Quiet", "", "", 1, 1, t0()).unwrap().id
        };

        let view = load_live_view(&db, &tracker, facade_id, t0()).await.unwrap();
        assert!(!view.status.is_online);
        assert!(view.last.is_none());
        assert!(view.recent.is_empty());
    }

    #[tokio::test]
    async fn test_live_view_degrades_when_history_unreadable() {
        let db = open_in_memory();
        let tracker = LivenessTracker::new();
        let facade_id = {
            let conn = db.lock().unwrap();
            let id = facades::insert_facade(&conn, "Broken", "", "", 1, 1, t0()).unwrap().id;
            conn.execute_batch("DROP TABLE play_history").unwrap();
            id
        };

        let view = load_live_view(&db, &tracker, facade_id, t0()).await.unwrap();
        assert!(view.last.is_none());
        assert!(view.recent.is_empty());
    }

    #[tokio::test]
    async fn test_persist_heartbeat_writes_sample_and_status() {
        let db = open_in_memory();
        let tracker = LivenessTracker::new();
        tracker.record_heartbeat(5, 42, "1.2.3.4", t0());
        let status = tracker.status(5, t0());

        let heartbeat = Heartbeat {
            facade_id: 5,
            latency_ms: 42,
            source_ip: "1.2.3.4".to_string(),
            timestamp: t0(),
        };
        persist_heartbeat(&db, heartbeat, &status).await.unwrap();

        let conn = db.lock().unwrap();
        assert_eq!(store::count_heartbeats(&conn, 5).unwrap(), 1);
        let saved = store::get_saved_status(&conn, 5).unwrap().unwrap();
        assert!(saved.is_online);
        assert_eq!(saved.last_seen, t0());
        assert_eq!(saved.latency_ms, Some(42));
    }
}
