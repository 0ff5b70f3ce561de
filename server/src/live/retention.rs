//! Background cleanup of old playback history.
//!
//! Spawns a tokio task that periodically deletes `play_history` rows older
//! than the configured number of days.

use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::RetentionConfig;
use crate::db::{self, live as store, DbPool};
use crate::error::StorageError;

/// Delete playbacks recorded more than `days` before `now`.
pub async fn purge_play_history(
    db: &DbPool,
    days: u32,
    now: DateTime<Utc>,
) -> Result<usize, StorageError> {
    let cutoff = now - TimeDelta::days(i64::from(days));
    db::blocking(db, move |conn| store::delete_play_events_before(conn, cutoff)).await
}

/// Spawn a background task that purges old play history every
/// `cleanup_interval_secs` until `shutdown` is cancelled.
pub fn spawn_play_history_cleanup(
    db: DbPool,
    retention: RetentionConfig,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(retention.cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            match purge_play_history(&db, retention.play_history_days, Utc::now()).await {
                Ok(count) if count > 0 => {
                    tracing::info!("Play history cleanup: purged {} old events", count);
                }
                Ok(_) => {
                    tracing::debug!("Play history cleanup: nothing to purge");
                }
                Err(e) => {
                    tracing::error!("Play history cleanup error: {}", e);
                }
            }
        }

        tracing::debug!("Play history cleanup stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::NewPlayEvent;
    use crate::db::open_in_memory;
    use chrono::TimeZone;

    fn event(media: &str) -> NewPlayEvent {
        NewPlayEvent {
            facade_id: 1,
            campaign_id: 1,
            slot_id: None,
            media_url: media.to_string(),
            duration_sec: 0,
            resolution_w: 0,
            resolution_h: 0,
            bitrate_kbps: 0,
            sync_latency_ms: 0,
        }
    }

    #[tokio::test]
    async fn test_purge_keeps_recent_events() {
        let db = open_in_memory();
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        {
            let conn = db.lock().unwrap();
            store::insert_play_event(&conn, event("old"), now - TimeDelta::days(91)).unwrap();
            store::insert_play_event(&conn, event("edge"), now - TimeDelta::days(89)).unwrap();
            store::insert_play_event(&conn, event("new"), now).unwrap();
        }

        let purged = purge_play_history(&db, 90, now).await.unwrap();
        assert_eq!(purged, 1);

        let conn = db.lock().unwrap();
        let left: Vec<String> = store::get_recent_events(&conn, 1, 10)
            .unwrap()
            .into_iter()
            .map(|e| e.media_url)
            .collect();
        assert_eq!(left, vec!["new".to_string(), "edge".to_string()]);
    }

    #[tokio::test]
    async fn test_cleanup_task_stops_on_shutdown() {
        let db = open_in_memory();
        let shutdown = CancellationToken::new();
        let handle = spawn_play_history_cleanup(db, RetentionConfig::default(), shutdown.clone());

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("cleanup task should stop")
            .unwrap();
    }
}
