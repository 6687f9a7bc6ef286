//! Dashboard Cache
//!
//! Per-vendor memo of segmentation output with a fixed time-to-live. One entry
//! per `(vendor, kind)`; entries are dropped only by expiry. The lock is held
//! for map access only, never while a result is being computed.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::services::clock::Clock;
use crate::services::segmentation::{DashboardMetrics, SegmentCounts};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    /// Full dashboard aggregate
    Dashboard,
    /// Segment counts only
    SegmentCounts,
}

impl CacheKind {
    pub fn ttl(&self) -> Duration {
        match self {
            CacheKind::Dashboard => Duration::minutes(5),
            CacheKind::SegmentCounts => Duration::hours(24),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedPayload {
    Dashboard(DashboardMetrics),
    SegmentCounts(SegmentCounts),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    vendor_id: i32,
    kind: CacheKind,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: CachedPayload,
    expires_at: DateTime<Utc>,
}

pub struct DashboardCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl DashboardCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Live entry for `(vendor_id, kind)`; an entry at or past its expiry is a miss.
    pub fn get(&self, vendor_id: i32, kind: CacheKind) -> Option<CachedPayload> {
        let key = CacheKey { vendor_id, kind };
        let now = self.clock.now();

        {
            let entries = self.entries.read();
            match entries.get(&key) {
                None => return None,
                Some(entry) if now < entry.expires_at => {
                    debug!("Cache hit for vendor {} {:?}", vendor_id, kind);
                    return Some(entry.payload.clone());
                }
                Some(_) => {}
            }
        }

        // Expired: drop it unless a concurrent writer already replaced it
        let mut entries = self.entries.write();
        if entries.get(&key).is_some_and(|e| now >= e.expires_at) {
            entries.remove(&key);
            debug!("Cache entry expired for vendor {} {:?}", vendor_id, kind);
        }
        None
    }

    /// Store with expiry `now + ttl`. Last write wins.
    pub fn put(&self, vendor_id: i32, kind: CacheKind, payload: CachedPayload, ttl: Duration) {
        let expires_at = self.clock.now() + ttl;
        self.entries.write().insert(
            CacheKey { vendor_id, kind },
            CacheEntry {
                payload,
                expires_at,
            },
        );
    }

    pub fn get_dashboard(&self, vendor_id: i32) -> Option<DashboardMetrics> {
        match self.get(vendor_id, CacheKind::Dashboard)? {
            CachedPayload::Dashboard(metrics) => Some(metrics),
            CachedPayload::SegmentCounts(_) => None,
        }
    }

    pub fn put_dashboard(&self, vendor_id: i32, metrics: DashboardMetrics) {
        let kind = CacheKind::Dashboard;
        self.put(vendor_id, kind, CachedPayload::Dashboard(metrics), kind.ttl());
    }

    pub fn get_segment_counts(&self, vendor_id: i32) -> Option<SegmentCounts> {
        match self.get(vendor_id, CacheKind::SegmentCounts)? {
            CachedPayload::SegmentCounts(counts) => Some(counts),
            CachedPayload::Dashboard(_) => None,
        }
    }

    pub fn put_segment_counts(&self, vendor_id: i32, counts: SegmentCounts) {
        let kind = CacheKind::SegmentCounts;
        self.put(vendor_id, kind, CachedPayload::SegmentCounts(counts), kind.ttl());
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
