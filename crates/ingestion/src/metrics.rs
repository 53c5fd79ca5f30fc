//! Capture loop metrics

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-source capture counters
#[derive(Debug, Default)]
pub struct CaptureMetrics {
    /// Observations published (sentinels included)
    pub published: AtomicU64,

    /// Non-empty observations
    pub detections: AtomicU64,

    /// Sensor faults, fatal ones included
    pub faults: AtomicU64,

    /// Empty sentinels published because of a fault
    pub sentinels: AtomicU64,
}

impl CaptureMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_published(&self, count: usize) {
        self.published.fetch_add(1, Ordering::Relaxed);
        if count > 0 {
            self.detections.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_fault(&self) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sentinel(&self) {
        self.sentinels.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CaptureMetricsSnapshot {
        CaptureMetricsSnapshot {
            published: self.published.load(Ordering::Relaxed),
            detections: self.detections.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
            sentinels: self.sentinels.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureMetricsSnapshot {
    pub published: u64,
    pub detections: u64,
    pub faults: u64,
    pub sentinels: u64,
}
