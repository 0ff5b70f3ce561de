//! Heartbeat, status and playback persistence.
//!
//! Plain functions over a borrowed connection; callers run them through
//! [`crate::db::blocking`] so several statements can share one lock.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};

use super::models::{Heartbeat, NewPlayEvent, PlayEvent, SavedFacadeStatus};
use super::{format_timestamp, timestamp_column};
use crate::error::StorageError;
use crate::ws::FacadeId;

const PLAY_EVENT_COLUMNS: &str = "id, facade_id, campaign_id, slot_id, media_url, played_at, \
     duration_sec, resolution_w, resolution_h, bitrate_kbps, sync_latency_ms";

fn play_event_from_row(row: &Row<'_>) -> rusqlite::Result<PlayEvent> {
    Ok(PlayEvent {
        id: row.get(0)?,
        facade_id: row.get(1)?,
        campaign_id: row.get(2)?,
        slot_id: row.get(3)?,
        media_url: row.get(4)?,
        played_at: timestamp_column(row, 5)?,
        duration_sec: row.get(6)?,
        resolution_w: row.get(7)?,
        resolution_h: row.get(8)?,
        bitrate_kbps: row.get(9)?,
        sync_latency_ms: row.get(10)?,
    })
}

/// Append one heartbeat sample. Returns the row id.
pub fn insert_heartbeat(conn: &Connection, heartbeat: &Heartbeat) -> Result<i64, StorageError> {
    conn.execute(
        "INSERT INTO facade_heartbeat (facade_id, timestamp, latency_ms, source_ip) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            heartbeat.facade_id,
            format_timestamp(heartbeat.timestamp),
            heartbeat.latency_ms,
            heartbeat.source_ip,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Number of heartbeat rows stored for a facade.
pub fn count_heartbeats(conn: &Connection, facade_id: FacadeId) -> Result<i64, StorageError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM facade_heartbeat WHERE facade_id = ?1",
        [facade_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Upsert the latest status snapshot for a facade.
pub fn save_facade_status(conn: &Connection, status: &SavedFacadeStatus) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO facade_status (facade_id, is_online, last_seen, latency_ms)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (facade_id) DO UPDATE SET
             is_online = excluded.is_online,
             last_seen = excluded.last_seen,
             latency_ms = excluded.latency_ms",
        rusqlite::params![
            status.facade_id,
            status.is_online,
            format_timestamp(status.last_seen),
            status.latency_ms,
        ],
    )?;
    Ok(())
}

pub fn get_saved_status(
    conn: &Connection,
    facade_id: FacadeId,
) -> Result<Option<SavedFacadeStatus>, StorageError> {
    let status = conn
        .query_row(
            "SELECT facade_id, is_online, last_seen, latency_ms FROM facade_status WHERE facade_id = ?1",
            [facade_id],
            |row| {
                Ok(SavedFacadeStatus {
                    facade_id: row.get(0)?,
                    is_online: row.get(1)?,
                    last_seen: timestamp_column(row, 2)?,
                    latency_ms: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(status)
}

/// Record a playback at `played_at` and return the stored event.
pub fn insert_play_event(
    conn: &Connection,
    event: NewPlayEvent,
    played_at: DateTime<Utc>,
) -> Result<PlayEvent, StorageError> {
    conn.execute(
        "INSERT INTO play_history (facade_id, campaign_id, slot_id, media_url, played_at,
             duration_sec, resolution_w, resolution_h, bitrate_kbps, sync_latency_ms)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        rusqlite::params![
            event.facade_id,
            event.campaign_id,
            event.slot_id,
            event.media_url,
            format_timestamp(played_at),
            event.duration_sec,
            event.resolution_w,
            event.resolution_h,
            event.bitrate_kbps,
            event.sync_latency_ms,
        ],
    )?;
    let id = conn.last_insert_rowid();
    Ok(event.into_event(id, played_at))
}

/// Most recent playback on a facade, if any.
pub fn get_last_played(conn: &Connection, facade_id: FacadeId) -> Result<Option<PlayEvent>, StorageError> {
    let event = conn
        .query_row(
            &format!(
                "SELECT {} FROM play_history WHERE facade_id = ?1 ORDER BY played_at DESC, id DESC LIMIT 1",
                PLAY_EVENT_COLUMNS
            ),
            [facade_id],
            play_event_from_row,
        )
        .optional()?;
    Ok(event)
}

/// Up to `limit` playbacks on a facade, newest first.
pub fn get_recent_events(
    conn: &Connection,
    facade_id: FacadeId,
    limit: usize,
) -> Result<Vec<PlayEvent>, StorageError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM play_history WHERE facade_id = ?1 ORDER BY played_at DESC, id DESC LIMIT ?2",
        PLAY_EVENT_COLUMNS
    ))?;
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let events = stmt
        .query_map(rusqlite::params![facade_id, limit], play_event_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(events)
}

/// Delete playbacks older than `cutoff`. Returns the number of rows removed.
pub fn delete_play_events_before(conn: &Connection, cutoff: DateTime<Utc>) -> Result<usize, StorageError> {
    let deleted = conn.execute(
        "DELETE FROM play_history WHERE played_at < ?1",
        [format_timestamp(cutoff)],
    )?;
    Ok(deleted)
}
