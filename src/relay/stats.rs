// Relay counters: path taken per request, fallbacks, bytes relayed, live streams.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;

struct RateSample {
    at: Instant,
    relayed_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelayStatsSnapshot {
    pub requests: u64,
    pub direct_fetches: u64,
    pub fallbacks: u64,
    pub local_slices: u64,
    pub relayed_bytes: u64,
    pub relay_bps: u64,
    pub active_streams: u32,
}

pub struct RelayStats {
    requests: AtomicU64,
    direct_fetches: AtomicU64,
    fallbacks: AtomicU64,
    local_slices: AtomicU64,
    relayed_bytes: AtomicU64,
    active_streams: AtomicU32,
    last_sample: Mutex<RateSample>,
}

impl RelayStats {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            direct_fetches: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
            local_slices: AtomicU64::new(0),
            relayed_bytes: AtomicU64::new(0),
            active_streams: AtomicU32::new(0),
            last_sample: Mutex::new(RateSample {
                at: Instant::now(),
                relayed_bytes: 0,
            }),
        }
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_direct_fetch(&self) {
        self.direct_fetches.fetch_add(1, Ordering::Relaxed);
    }

    /// A direct ranged fetch failed and the request moved to the local-slice path.
    pub fn record_fallback(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_slice(&self) {
        self.local_slices.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_relayed(&self, bytes: u64) {
        self.relayed_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn stream_started(&self) {
        self.active_streams.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stream_finished(&self) {
        self.active_streams.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn fallbacks(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> RelayStatsSnapshot {
        let now = Instant::now();
        let relayed = self.relayed_bytes.load(Ordering::Relaxed);

        let relay_bps = {
            let mut sample = self.last_sample.lock();
            let elapsed = now.duration_since(sample.at).as_secs_f64();
            let bps = if elapsed > 0.1 {
                (relayed.saturating_sub(sample.relayed_bytes) as f64 / elapsed) as u64
            } else {
                0
            };
            sample.at = now;
            sample.relayed_bytes = relayed;
            bps
        };

        RelayStatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            direct_fetches: self.direct_fetches.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            local_slices: self.local_slices.load(Ordering::Relaxed),
            relayed_bytes: relayed,
            relay_bps,
            active_streams: self.active_streams.load(Ordering::Relaxed),
        }
    }
}

impl Default for RelayStats {
    fn default() -> Self {
        Self::new()
    }
}
