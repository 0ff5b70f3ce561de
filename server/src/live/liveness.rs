//! In-memory facade liveness derived from heartbeats.
//!
//! One record per facade in a DashMap, so heartbeats for different facades
//! never contend. A facade is online while its last heartbeat is younger than
//! [`ONLINE_THRESHOLD`]. The reported latency is the mean over every sample
//! the facade has sent since the process started.

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::ws::FacadeId;

/// A facade counts as online while its newest heartbeat is younger than this.
pub const ONLINE_THRESHOLD: TimeDelta = TimeDelta::seconds(10);

#[derive(Debug, Clone)]
pub struct LivenessRecord {
    pub last_heartbeat_at: DateTime<Utc>,
    pub last_latency_ms: u32,
    pub last_source_ip: String,
    latency_sum_ms: u64,
    samples: u64,
}

impl LivenessRecord {
    fn new(latency_ms: u32, source_ip: &str, now: DateTime<Utc>) -> Self {
        Self {
            last_heartbeat_at: now,
            last_latency_ms: latency_ms,
            last_source_ip: source_ip.to_string(),
            latency_sum_ms: u64::from(latency_ms),
            samples: 1,
        }
    }

    fn record(&mut self, latency_ms: u32, source_ip: &str, now: DateTime<Utc>) {
        // Late deliveries still count towards the average but never move
        // the last-seen time backwards.
        if now >= self.last_heartbeat_at {
            self.last_heartbeat_at = now;
            self.last_latency_ms = latency_ms;
            self.last_source_ip = source_ip.to_string();
        }
        self.latency_sum_ms = self.latency_sum_ms.saturating_add(u64::from(latency_ms));
        self.samples += 1;
    }

    /// Rounded mean latency.
    pub fn average_latency_ms(&self) -> u32 {
        if self.samples == 0 {
            return 0;
        }
        let mean = (self.latency_sum_ms + self.samples / 2) / self.samples;
        u32::try_from(mean).unwrap_or(u32::MAX)
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn is_online_at(&self, now: DateTime<Utc>) -> bool {
        now - self.last_heartbeat_at < ONLINE_THRESHOLD
    }

    fn status_at(&self, facade_id: FacadeId, now: DateTime<Utc>) -> FacadeStatus {
        FacadeStatus {
            facade_id,
            is_online: self.is_online_at(now),
            avg_latency_ms: self.average_latency_ms(),
            last_latency_ms: Some(self.last_latency_ms),
            last_seen: Some(self.last_heartbeat_at),
        }
    }
}

/// Answer to a status query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacadeStatus {
    pub facade_id: FacadeId,
    pub is_online: bool,
    pub avg_latency_ms: u32,
    pub last_latency_ms: Option<u32>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl FacadeStatus {
    /// Status of a facade that never sent a heartbeat.
    pub fn unknown(facade_id: FacadeId) -> Self {
        Self {
            facade_id,
            is_online: false,
            avg_latency_ms: 0,
            last_latency_ms: None,
            last_seen: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct LivenessTracker {
    records: DashMap<FacadeId, LivenessRecord>,
}

impl LivenessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one heartbeat sample taken at `now`.
    pub fn record_heartbeat(
        &self,
        facade_id: FacadeId,
        latency_ms: u32,
        source_ip: &str,
        now: DateTime<Utc>,
    ) {
        self.records
            .entry(facade_id)
            .and_modify(|record| record.record(latency_ms, source_ip, now))
            .or_insert_with(|| LivenessRecord::new(latency_ms, source_ip, now));

        tracing::debug!(facade_id, latency_ms, source_ip, "Heartbeat recorded");
    }

    /// Derive the facade's status as of `now`. Unknown facades are offline.
    pub fn status(&self, facade_id: FacadeId, now: DateTime<Utc>) -> FacadeStatus {
        match self.records.get(&facade_id) {
            Some(record) => record.status_at(facade_id, now),
            None => FacadeStatus::unknown(facade_id),
        }
    }

    pub fn record(&self, facade_id: FacadeId) -> Option<LivenessRecord> {
        self.records.get(&facade_id).map(|entry| entry.value().clone())
    }

    /// Facades online at `now`, most recently seen first.
    pub fn online_facades(&self, now: DateTime<Utc>) -> Vec<FacadeStatus> {
        let mut online: Vec<FacadeStatus> = self
            .records
            .iter()
            .filter(|entry| entry.value().is_online_at(now))
            .map(|entry| entry.value().status_at(*entry.key(), now))
            .collect();
        online.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        online
    }
}
