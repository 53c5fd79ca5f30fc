//! Session metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by the session worker and its handle
#[derive(Debug, Default)]
pub struct SessionMetrics {
    /// Frames written to the transport
    frames_sent: AtomicU64,
    /// Reports dropped by the manager (not connected, write failed)
    discarded_count: AtomicU64,
    /// Reports replaced by a newer one before they were written, or
    /// submitted after the worker stopped
    dropped_count: AtomicU64,
    /// Pending report dropped after a (re)connect
    stale_count: AtomicU64,
    /// Connect attempts, failed or not
    connect_attempts: AtomicU64,
    /// Failed or timed out connect attempts
    connect_failures: AtomicU64,
    /// Link losses detected while connected
    link_losses: AtomicU64,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    pub fn inc_frames_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn discarded_count(&self) -> u64 {
        self.discarded_count.load(Ordering::Relaxed)
    }

    pub fn inc_discarded_count(&self) {
        self.discarded_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    pub fn inc_dropped_count(&self) {
        self.dropped_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stale_count(&self) -> u64 {
        self.stale_count.load(Ordering::Relaxed)
    }

    pub fn add_stale_count(&self, n: u64) {
        self.stale_count.fetch_add(n, Ordering::Relaxed);
    }

    pub fn connect_attempts(&self) -> u64 {
        self.connect_attempts.load(Ordering::Relaxed)
    }

    pub fn inc_connect_attempts(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connect_failures(&self) -> u64 {
        self.connect_failures.load(Ordering::Relaxed)
    }

    pub fn inc_connect_failures(&self) {
        self.connect_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn link_losses(&self) -> u64 {
        self.link_losses.load(Ordering::Relaxed)
    }

    pub fn inc_link_losses(&self) {
        self.link_losses.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> SessionMetricsSnapshot {
        SessionMetricsSnapshot {
            frames_sent: self.frames_sent(),
            discarded_count: self.discarded_count(),
            dropped_count: self.dropped_count(),
            stale_count: self.stale_count(),
            connect_attempts: self.connect_attempts(),
            connect_failures: self.connect_failures(),
            link_losses: self.link_losses(),
        }
    }
}

/// Snapshot of session metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SessionMetricsSnapshot {
    pub frames_sent: u64,
    pub discarded_count: u64,
    pub dropped_count: u64,
    pub stale_count: u64,
    pub connect_attempts: u64,
    pub connect_failures: u64,
    pub link_losses: u64,
}
