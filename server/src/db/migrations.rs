use rusqlite_migration::{Migrations, M};

/// Define all schema migrations.
/// Uses SQLite user_version pragma for tracking, no migration table.
///
/// Heartbeat and playback rows carry no foreign key to `facades`:
/// players report before an operator has registered the screen.
pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        M::up(
            "-- Migration 1: Facades and liveness

CREATE TABLE facades (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    city TEXT NOT NULL DEFAULT '',
    address TEXT NOT NULL DEFAULT '',
    width_cells INTEGER NOT NULL DEFAULT 0,
    height_cells INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE TABLE facade_heartbeat (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    facade_id INTEGER NOT NULL,
    timestamp TEXT NOT NULL,
    latency_ms INTEGER NOT NULL,
    source_ip TEXT NOT NULL
);

CREATE INDEX idx_heartbeat_facade ON facade_heartbeat(facade_id, timestamp);

CREATE TABLE facade_status (
    facade_id INTEGER PRIMARY KEY,
    is_online INTEGER NOT NULL,
    last_seen TEXT NOT NULL,
    latency_ms INTEGER
);
",
        ),
        M::up(
            "-- Migration 2: Playback history

CREATE TABLE play_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    facade_id INTEGER NOT NULL,
    campaign_id INTEGER NOT NULL,
    slot_id INTEGER,
    media_url TEXT NOT NULL,
    played_at TEXT NOT NULL,
    duration_sec INTEGER NOT NULL DEFAULT 0,
    resolution_w INTEGER NOT NULL DEFAULT 0,
    resolution_h INTEGER NOT NULL DEFAULT 0,
    bitrate_kbps INTEGER NOT NULL DEFAULT 0,
    sync_latency_ms INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX idx_play_history_facade ON play_history(facade_id, played_at);
CREATE INDEX idx_play_history_played_at ON play_history(played_at);
",
        ),
    ])
}
