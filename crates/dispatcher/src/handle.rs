//! SessionHandle - runs a SessionManager on its own task behind a latest-report slot

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use contracts::{LinkTransport, ProximityReport};
use observability::metrics::record_report_discarded;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, trace};

use crate::error::SessionError;
use crate::metrics::SessionMetrics;
use crate::session::{SessionManager, SessionPhase};

#[derive(Debug, Default)]
struct SlotState {
    pending: Option<ProximityReport>,
    closed: bool,
}

/// 单槽信箱: 新报告覆盖 worker 尚未取走的旧报告
///
/// One writer (the tick loop) and one reader (the worker). A report that is
/// still waiting when a newer one arrives is replaced, so the worker always
/// writes the most recent tick.
#[derive(Debug, Default)]
struct LatestReport {
    state: Mutex<SlotState>,
    notify: Notify,
}

impl LatestReport {
    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `report` and return the unsent report it replaced
    ///
    /// Hands `report` back once the slot is closed.
    fn put(&self, report: ProximityReport) -> Result<Option<ProximityReport>, ProximityReport> {
        let replaced = {
            let mut state = self.lock();
            if state.closed {
                return Err(report);
            }
            state.pending.replace(report)
        };
        self.notify.notify_one();
        Ok(replaced)
    }

    fn take(&self) -> Option<ProximityReport> {
        self.lock().pending.take()
    }

    /// Refuse further reports; a pending one stays readable
    fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_one();
    }

    /// Wait for the next report, `None` once closed and empty
    async fn next(&self) -> Option<ProximityReport> {
        loop {
            {
                let mut state = self.lock();
                if let Some(report) = state.pending.take() {
                    return Some(report);
                }
                if state.closed {
                    return None;
                }
            }
            // notify_one stores a permit, a put between unlock and here is not lost
            self.notify.notified().await;
        }
    }
}

/// Handle to a running session worker
pub struct SessionHandle {
    /// Transport name
    name: String,
    /// Latest report waiting for the worker
    slot: Arc<LatestReport>,
    /// Shared metrics
    metrics: Arc<SessionMetrics>,
    /// Worker task handle, yields the final phase
    worker_handle: JoinHandle<SessionPhase>,
}

impl SessionHandle {
    /// Spawn the worker task
    ///
    /// The worker connects first and stops on the shutdown signal or when
    /// the handle is shut down.
    pub fn spawn<T: LinkTransport + 'static>(
        manager: SessionManager<T>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let name = manager.transport().name().to_string();
        let slot = Arc::new(LatestReport::default());
        let metrics = Arc::clone(manager.metrics());

        let worker_name = name.clone();
        let worker_slot = Arc::clone(&slot);
        let worker_handle = tokio::spawn(async move {
            session_worker(manager, worker_slot, shutdown, worker_name).await
        });

        Self {
            name,
            slot,
            metrics,
            worker_handle,
        }
    }

    /// Get transport name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<SessionMetrics> {
        &self.metrics
    }

    /// Hand a report to the worker (non-blocking)
    ///
    /// Returns false when a report was lost: an older unsent one was
    /// superseded, or the worker is gone and `report` itself is dropped.
    pub fn submit(&self, report: ProximityReport) -> bool {
        match self.slot.put(report) {
            Ok(None) => true,
            Ok(Some(_)) => {
                self.metrics.inc_dropped_count();
                record_report_discarded("superseded");
                trace!(transport = %self.name, "unsent report superseded");
                false
            }
            Err(_) => {
                self.metrics.inc_dropped_count();
                record_report_discarded("worker_closed");
                error!(transport = %self.name, "session worker closed unexpectedly");
                false
            }
        }
    }

    /// Stop the worker and wait for it to close the session
    ///
    /// A pending report is still written. A worker still waiting for the
    /// link only stops once the shutdown signal is sent.
    #[instrument(name = "session_handle_shutdown", skip(self), fields(transport = %self.name))]
    pub async fn shutdown(self) -> SessionPhase {
        self.slot.close();
        match self.worker_handle.await {
            Ok(phase) => {
                debug!(transport = %self.name, phase = %phase, "SessionHandle shutdown complete");
                phase
            }
            Err(e) => {
                error!(transport = %self.name, error = ?e, "session worker panicked");
                SessionPhase::Closed
            }
        }
    }
}

/// Drop the report that waited while the link was down
fn drop_stale(slot: &LatestReport, metrics: &SessionMetrics) {
    if slot.take().is_some() {
        metrics.add_stale_count(1);
        record_report_discarded("stale");
        debug!("discarded report submitted while disconnected");
    }
}

/// Worker task that keeps the link up and writes the latest report
#[instrument(
    name = "session_worker_loop",
    skip(manager, slot, shutdown),
    fields(transport = %name)
)]
async fn session_worker<T: LinkTransport>(
    mut manager: SessionManager<T>,
    slot: Arc<LatestReport>,
    mut shutdown: watch::Receiver<bool>,
    name: String,
) -> SessionPhase {
    debug!(transport = %name, "session worker started");

    loop {
        if manager.phase().needs_link() {
            match manager.ensure_connected().await {
                Ok(()) => drop_stale(&slot, manager.metrics()),
                Err(SessionError::Shutdown) => break,
                Err(e) => {
                    error!(error = %e, "session could not be established");
                    break;
                }
            }
        }

        let report = tokio::select! {
            biased;
            _ = shutdown.wait_for(|stop| *stop) => None,
            report = slot.next() => report,
        };
        let Some(report) = report else {
            break;
        };

        match manager.send(&report).await {
            Ok(_) => {}
            Err(SessionError::Shutdown) => break,
            // Not a link problem, keep the session
            Err(e) => error!(error = %e, "report not encodable, dropped"),
        }
    }

    slot.close();
    if slot.take().is_some() {
        manager.metrics().inc_discarded_count();
        record_report_discarded("shutdown");
    }
    manager.close().await;
    debug!(transport = %name, "session worker stopped");
    manager.phase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionPolicy;
    use link::{MockTransport, MockTransportConfig};
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    fn policy() -> SessionPolicy {
        SessionPolicy {
            backoff: Duration::from_millis(100),
            scan_retry: Duration::from_millis(100),
            ..SessionPolicy::default()
        }
    }

    fn report(distance: f64) -> ProximityReport {
        ProximityReport::present(distance, 10.0, 5.0)
    }

    /// Distance field of a present frame such as `1, 4, 10, 5\r`
    fn frame_distance(frame: &[u8]) -> f64 {
        let text = std::str::from_utf8(frame).unwrap();
        text.trim_end_matches('\r')
            .split(", ")
            .nth(1)
            .unwrap()
            .parse()
            .unwrap()
    }

    #[tokio::test]
    async fn test_session_handle_basic() {
        let transport = MockTransport::new();
        let probe = transport.probe();
        let (_tx, rx) = watch::channel(false);
        let manager = SessionManager::new(transport, policy(), rx.clone());
        let handle = SessionHandle::spawn(manager, rx);

        // let the worker connect
        while !probe.is_connected() {
            sleep(Duration::from_millis(1)).await;
        }
        for i in 0..5 {
            assert!(handle.submit(report(i as f64)));
            sleep(Duration::from_millis(1)).await;
        }

        let phase = handle.shutdown().await;
        assert_eq!(phase, SessionPhase::Closed);
        assert_eq!(probe.frame_count(), 5);
        assert_eq!(probe.frames()[4].as_ref(), b"1, 4, 10, 5\r");
        assert_eq!(probe.disconnects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsent_reports_are_superseded() {
        let transport = MockTransport::with_config(MockTransportConfig {
            connect_failures: 3,
            ..Default::default()
        });
        let probe = transport.probe();
        let (tx, rx) = watch::channel(false);
        let manager = SessionManager::new(transport, policy(), rx.clone());
        let handle = SessionHandle::spawn(manager, rx);

        assert!(handle.submit(report(0.0)));
        for i in 1..10 {
            assert!(!handle.submit(report(i as f64)));
        }
        assert_eq!(handle.metrics().dropped_count(), 9);

        // link comes up after the backoffs; the waiting report is stale
        while !probe.is_connected() {
            sleep(Duration::from_millis(10)).await;
        }
        sleep(Duration::from_millis(10)).await;
        assert_eq!(handle.metrics().stale_count(), 1);
        assert_eq!(probe.frame_count(), 0);

        assert!(handle.submit(report(1.5)));
        sleep(Duration::from_millis(10)).await;
        assert_eq!(probe.frame_count(), 1);

        tx.send(true).unwrap();
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_link_delivers_latest_report() {
        let transport = MockTransport::with_config(MockTransportConfig {
            write_delay: Some(Duration::from_millis(500)),
            ..Default::default()
        });
        let probe = transport.probe();
        let (tx, rx) = watch::channel(false);
        let manager = SessionManager::new(transport, policy(), rx.clone());
        let handle = SessionHandle::spawn(manager, rx);

        while !probe.is_connected() {
            sleep(Duration::from_millis(1)).await;
        }
        for i in 0..20 {
            handle.submit(report(i as f64));
            sleep(Duration::from_millis(50)).await;
        }
        // last write finishes well within this
        sleep(Duration::from_secs(2)).await;

        let frames = probe.frames();
        let distances: Vec<f64> = frames.iter().map(|f| frame_distance(f)).collect();
        assert_eq!(distances.last().copied(), Some(19.0), "delivered: {distances:?}");
        assert!(
            distances.windows(2).all(|w| w[0] < w[1]),
            "delivered out of order: {distances:?}"
        );
        // a write spans ten ticks, so most reports are superseded
        assert!(frames.len() <= 4, "delivered: {distances:?}");

        let snapshot = handle.metrics().snapshot();
        assert_eq!(snapshot.frames_sent + snapshot.dropped_count, 20);

        tx.send(true).unwrap();
        assert_eq!(handle.shutdown().await, SessionPhase::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_worker_stuck_in_write() {
        let transport = MockTransport::with_config(MockTransportConfig {
            write_hangs: u32::MAX,
            ..Default::default()
        });
        let probe = transport.probe();
        let (tx, rx) = watch::channel(false);
        let policy = SessionPolicy {
            write_timeout: Duration::from_secs(3600),
            ..policy()
        };
        let manager = SessionManager::new(transport, policy, rx.clone());
        let handle = SessionHandle::spawn(manager, rx);

        while !probe.is_connected() {
            sleep(Duration::from_millis(1)).await;
        }
        assert!(handle.submit(report(1.0)));
        sleep(Duration::from_millis(100)).await;
        assert_eq!(probe.write_attempts(), 1);

        tx.send(true).unwrap();
        let metrics = Arc::clone(handle.metrics());
        let phase = timeout(Duration::from_secs(5), handle.shutdown())
            .await
            .expect("worker stuck in write");
        assert_eq!(phase, SessionPhase::Closed);
        assert_eq!(metrics.discarded_count(), 1);
        assert_eq!(probe.frame_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_recovers_after_link_drop() {
        let transport = MockTransport::with_config(MockTransportConfig {
            drop_after_writes: Some(3),
            ..Default::default()
        });
        let probe = transport.probe();
        let (tx, rx) = watch::channel(false);
        let manager = SessionManager::new(transport, policy(), rx.clone());
        let handle = SessionHandle::spawn(manager, rx);

        for i in 0..8 {
            handle.submit(report(i as f64));
            sleep(Duration::from_millis(200)).await;
        }

        let snapshot = handle.metrics().snapshot();
        assert!(probe.connects() >= 2, "connects: {}", probe.connects());
        assert!(snapshot.link_losses >= 1);
        assert!(snapshot.frames_sent >= 6);

        tx.send(true).unwrap();
        assert_eq!(handle.shutdown().await, SessionPhase::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_signal_stops_reconnecting_worker() {
        let transport = MockTransport::with_config(MockTransportConfig {
            connect_failures: u32::MAX,
            ..Default::default()
        });
        let probe = transport.probe();
        let (tx, rx) = watch::channel(false);
        let manager = SessionManager::new(transport, policy(), rx.clone());
        let handle = SessionHandle::spawn(manager, rx);

        sleep(Duration::from_secs(1)).await;
        tx.send(true).unwrap();
        assert_eq!(handle.shutdown().await, SessionPhase::Closed);
        assert!(probe.connect_attempts() >= 5);
        assert_eq!(probe.disconnects(), 0);
    }
}
