//! SessionManager - 链路会话状态机
//!
//! `Discovering → Connecting → Connected ⇄ Reconnecting → Closed`
//!
//! 发现与连接都无限重试，只有 shutdown 能终止循环。发送为 fire-and-forget：
//! 链路断开时报告直接丢弃，不做重放。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use contracts::{
    wire, LinkConfig, LinkTransport, PeerAddress, ProximityReport, Session, SessionState,
};
use observability::metrics::{
    record_connect_attempt, record_frame_sent, record_report_discarded, record_session_state,
};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument, warn};

use crate::error::SessionError;
use crate::metrics::SessionMetrics;

/// Session manager phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Discovering,
    Connecting,
    Connected,
    Reconnecting,
    Closed,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Discovering => "discovering",
            SessionPhase::Connecting => "connecting",
            SessionPhase::Connected => "connected",
            SessionPhase::Reconnecting => "reconnecting",
            SessionPhase::Closed => "closed",
        }
    }

    /// Whether the manager still has to (re)establish the link
    pub fn needs_link(&self) -> bool {
        matches!(
            self,
            SessionPhase::Discovering | SessionPhase::Connecting | SessionPhase::Reconnecting
        )
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single [`SessionManager::send`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Frame handed to the transport
    Sent,
    /// Report dropped, never replayed
    Discarded,
}

/// Timing policy of the session
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    pub name_filter: String,
    pub scan_window: Duration,
    pub scan_retry: Duration,
    pub connect_timeout: Duration,
    /// Longest a single write may take before the link counts as lost
    pub write_timeout: Duration,
    pub backoff: Duration,
    pub settle: Duration,
    pub shutdown_grace: Duration,
}

impl From<&LinkConfig> for SessionPolicy {
    fn from(config: &LinkConfig) -> Self {
        Self {
            name_filter: config.peer_name_filter.clone(),
            scan_window: config.scan_window(),
            scan_retry: config.scan_retry(),
            connect_timeout: config.connect_timeout(),
            write_timeout: config.connect_timeout(),
            backoff: config.backoff(),
            settle: config.settle(),
            shutdown_grace: config.shutdown_grace(),
        }
    }
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::from(&LinkConfig::default())
    }
}

/// Run `fut` unless shutdown is (or becomes) requested
///
/// A dropped shutdown sender counts as a request.
async fn until_shutdown<F: Future>(
    shutdown: &mut watch::Receiver<bool>,
    fut: F,
) -> Result<F::Output, SessionError> {
    tokio::select! {
        biased;
        _ = shutdown.wait_for(|stop| *stop) => Err(SessionError::Shutdown),
        out = fut => Ok(out),
    }
}

/// 会话状态机
pub struct SessionManager<T: LinkTransport> {
    transport: T,
    policy: SessionPolicy,
    phase: SessionPhase,
    session: Option<Session>,
    shutdown: watch::Receiver<bool>,
    metrics: Arc<SessionMetrics>,
}

impl<T: LinkTransport> SessionManager<T> {
    pub fn new(transport: T, policy: SessionPolicy, shutdown: watch::Receiver<bool>) -> Self {
        Self::with_metrics(transport, policy, shutdown, Arc::new(SessionMetrics::new()))
    }

    pub fn with_metrics(
        transport: T,
        policy: SessionPolicy,
        shutdown: watch::Receiver<bool>,
        metrics: Arc<SessionMetrics>,
    ) -> Self {
        Self {
            transport,
            policy,
            phase: SessionPhase::Discovering,
            session: None,
            shutdown,
            metrics,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    pub fn metrics(&self) -> &Arc<SessionMetrics> {
        &self.metrics
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        if self.phase != phase {
            debug!(from = %self.phase, to = %phase, "session phase change");
            self.phase = phase;
            record_session_state(phase.as_str());
        }
    }

    fn set_session_state(&mut self, state: SessionState) {
        if let Some(session) = self.session.as_mut() {
            session.state = state;
        }
    }

    /// Scan until a matching peer is found
    ///
    /// # Errors
    /// Only [`SessionError::Shutdown`].
    #[instrument(name = "session_discover", skip(self), fields(transport = %self.transport.name()))]
    pub async fn discover(&mut self) -> Result<PeerAddress, SessionError> {
        self.set_phase(SessionPhase::Discovering);
        let filter = self.policy.name_filter.clone();
        let mut attempt: u64 = 0;

        loop {
            attempt += 1;
            info!(attempt, filter = %filter, "scanning for peer");

            let scan = self.transport.discover(&filter, self.policy.scan_window);
            match until_shutdown(&mut self.shutdown, scan).await? {
                Ok(Some(address)) => {
                    info!(attempt, address = %address, "peer discovered");
                    self.session = Some(Session::discovered(address.clone()));
                    self.set_phase(SessionPhase::Connecting);
                    return Ok(address);
                }
                Ok(None) => debug!(attempt, "no matching peer in scan window"),
                Err(e) => warn!(attempt, error = %e, "discovery scan failed"),
            }

            until_shutdown(&mut self.shutdown, sleep(self.policy.scan_retry)).await?;
        }
    }

    /// Connect to the discovered peer, retrying forever with backoff
    ///
    /// Runs discovery first when no peer is known yet.
    #[instrument(name = "session_establish", skip(self), fields(transport = %self.transport.name()))]
    pub async fn establish(&mut self) -> Result<(), SessionError> {
        let address = match self.session.as_ref() {
            Some(session) => session.address.clone(),
            None => self.discover().await?,
        };
        if self.phase == SessionPhase::Discovering {
            self.set_phase(SessionPhase::Connecting);
        }

        loop {
            self.set_session_state(SessionState::Connecting);
            self.metrics.inc_connect_attempts();

            let connect_timeout = self.policy.connect_timeout;
            let attempt = timeout(
                connect_timeout,
                self.transport.connect(&address, connect_timeout),
            );
            let failure = match until_shutdown(&mut self.shutdown, attempt).await? {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(_) => Some(format!(
                    "no response within {}ms",
                    connect_timeout.as_millis()
                )),
            };

            let Some(reason) = failure else {
                record_connect_attempt(true);
                break;
            };

            record_connect_attempt(false);
            self.metrics.inc_connect_failures();
            let retry_count = match self.session.as_mut() {
                Some(session) => {
                    session.retry_count += 1;
                    session.state = SessionState::Disconnected;
                    session.retry_count
                }
                None => 0,
            };
            warn!(
                address = %address,
                attempt = retry_count,
                error = %reason,
                "connect failed, backing off"
            );
            until_shutdown(&mut self.shutdown, sleep(self.policy.backoff)).await?;
        }

        if let Some(session) = self.session.as_mut() {
            info!(address = %address, retries = session.retry_count, "link connected");
            session.retry_count = 0;
            session.state = SessionState::Connected;
        }

        if !self.policy.settle.is_zero() {
            debug!(settle_ms = self.policy.settle.as_millis() as u64, "waiting for peer to settle");
            until_shutdown(&mut self.shutdown, sleep(self.policy.settle)).await?;
        }
        self.set_phase(SessionPhase::Connected);
        Ok(())
    }

    /// Re-establish a lost link with the same backoff policy
    pub async fn reconnect(&mut self) -> Result<(), SessionError> {
        if self.phase == SessionPhase::Connected {
            return Ok(());
        }
        self.set_phase(SessionPhase::Reconnecting);
        self.establish().await
    }

    /// Bring the link up from whatever phase the manager is in
    pub async fn ensure_connected(&mut self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Connected => Ok(()),
            SessionPhase::Closed => Err(SessionError::Shutdown),
            SessionPhase::Reconnecting => self.reconnect().await,
            SessionPhase::Discovering | SessionPhase::Connecting => self.establish().await,
        }
    }

    /// Write one report, fire-and-forget
    ///
    /// A lost link or a write slower than `write_timeout` moves the manager
    /// to `Reconnecting`; the report is lost.
    ///
    /// # Errors
    /// [`SessionError::Wire`] if the report holds a non-finite number,
    /// [`SessionError::Shutdown`] if shutdown interrupts the write.
    pub async fn send(&mut self, report: &ProximityReport) -> Result<SendOutcome, SessionError> {
        if self.phase != SessionPhase::Connected {
            self.discard("not_connected");
            return Ok(SendOutcome::Discarded);
        }

        if !self.transport.is_connected() {
            warn!("link lost before write");
            self.link_lost();
            self.discard("link_lost");
            return Ok(SendOutcome::Discarded);
        }

        let frame = wire::encode(report)?;
        let write_timeout = self.policy.write_timeout;
        let write = timeout(write_timeout, self.transport.write(&frame));
        let written = match until_shutdown(&mut self.shutdown, write).await {
            Ok(written) => written,
            Err(e) => {
                self.discard("shutdown");
                return Err(e);
            }
        };

        match written {
            Ok(Ok(())) => {
                self.metrics.inc_frames_sent();
                record_frame_sent(frame.len());
                Ok(SendOutcome::Sent)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "write failed");
                self.link_lost();
                self.discard("write_failed");
                Ok(SendOutcome::Discarded)
            }
            Err(_) => {
                warn!(
                    write_timeout_ms = write_timeout.as_millis() as u64,
                    "write timed out"
                );
                self.link_lost();
                self.discard("write_timeout");
                Ok(SendOutcome::Discarded)
            }
        }
    }

    fn link_lost(&mut self) {
        self.metrics.inc_link_losses();
        self.set_session_state(SessionState::Disconnected);
        self.set_phase(SessionPhase::Reconnecting);
    }

    fn discard(&self, reason: &str) {
        self.metrics.inc_discarded_count();
        record_report_discarded(reason);
    }

    /// Close the link, bounded by the shutdown grace period
    ///
    /// Ends in `Closed` whatever the transport does.
    #[instrument(name = "session_close", skip(self), fields(phase = %self.phase))]
    pub async fn close(&mut self) {
        if self.phase == SessionPhase::Closed {
            return;
        }
        if self.phase == SessionPhase::Connected {
            let grace = self.policy.shutdown_grace;
            match timeout(grace, self.transport.disconnect()).await {
                Ok(Ok(())) => info!("link closed"),
                Ok(Err(e)) => warn!(error = %e, "disconnect failed"),
                Err(_) => warn!(grace_ms = grace.as_millis() as u64, "disconnect timed out"),
            }
        }
        self.set_session_state(SessionState::Disconnected);
        self.set_phase(SessionPhase::Closed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use link::{MockTransport, MockTransportConfig};

    fn policy() -> SessionPolicy {
        SessionPolicy {
            name_filter: "BLE-Server-EyeCan".into(),
            scan_window: Duration::from_millis(100),
            scan_retry: Duration::from_millis(500),
            connect_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(2),
            backoff: Duration::from_secs(1),
            settle: Duration::ZERO,
            shutdown_grace: Duration::from_secs(2),
        }
    }

    fn report() -> ProximityReport {
        ProximityReport::present(3.25, 10.0, 5.0)
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovery_retries_until_found() {
        let transport = MockTransport::with_config(MockTransportConfig {
            discovery_misses: 3,
            ..Default::default()
        });
        let probe = transport.probe();
        let (_tx, rx) = watch::channel(false);
        let mut manager = SessionManager::new(transport, policy(), rx);

        let address = manager.discover().await.unwrap();
        assert_eq!(address.as_str(), "AA:BB:CC:DD:EE:FF");
        assert_eq!(probe.discover_calls(), 4);
        assert_eq!(manager.phase(), SessionPhase::Connecting);
        assert_eq!(
            manager.session().map(|s| s.state),
            Some(SessionState::Discovered)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnection_liveness() {
        const FAILURES: u32 = 5;
        let transport = MockTransport::with_config(MockTransportConfig {
            connect_failures: FAILURES,
            ..Default::default()
        });
        let probe = transport.probe();
        let (_tx, rx) = watch::channel(false);
        let mut manager = SessionManager::new(transport, policy(), rx);

        let started = tokio::time::Instant::now();
        manager.establish().await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(manager.phase(), SessionPhase::Connected);
        assert_eq!(probe.connect_attempts(), FAILURES + 1);
        assert!(elapsed <= policy().backoff * FAILURES, "took {elapsed:?}");
        assert_eq!(manager.session().map(|s| s.retry_count), Some(0));
        assert_eq!(manager.metrics().connect_failures(), u64::from(FAILURES));

        assert_eq!(manager.send(&report()).await.unwrap(), SendOutcome::Sent);
        assert_eq!(probe.frames()[0].as_ref(), b"1, 3.25, 10, 5\r");
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_connect_is_bounded_by_timeout() {
        let transport = MockTransport::with_config(MockTransportConfig {
            connect_hangs: 2,
            ..Default::default()
        });
        let probe = transport.probe();
        let (_tx, rx) = watch::channel(false);
        let mut manager = SessionManager::new(transport, policy(), rx);

        let started = tokio::time::Instant::now();
        manager.establish().await.unwrap();
        let per_attempt = policy().connect_timeout + policy().backoff;

        assert_eq!(probe.connect_attempts(), 3);
        assert!(started.elapsed() <= per_attempt * 2);
        assert_eq!(manager.phase(), SessionPhase::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_delay_before_connected() {
        let mut p = policy();
        p.settle = Duration::from_secs(5);
        let (_tx, rx) = watch::channel(false);
        let mut manager = SessionManager::new(MockTransport::new(), p, rx);

        let started = tokio::time::Instant::now();
        manager.establish().await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert_eq!(manager.phase(), SessionPhase::Connected);
    }

    #[tokio::test]
    async fn test_send_when_not_connected_discards() {
        let transport = MockTransport::new();
        let probe = transport.probe();
        let (_tx, rx) = watch::channel(false);
        let mut manager = SessionManager::new(transport, policy(), rx);

        assert_eq!(manager.send(&report()).await.unwrap(), SendOutcome::Discarded);
        assert_eq!(probe.frame_count(), 0);
        assert_eq!(manager.metrics().discarded_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_loss_moves_to_reconnecting() {
        let transport = MockTransport::new();
        let probe = transport.probe();
        let (_tx, rx) = watch::channel(false);
        let mut manager = SessionManager::new(transport, policy(), rx);
        manager.establish().await.unwrap();

        probe.drop_link();
        assert_eq!(manager.send(&report()).await.unwrap(), SendOutcome::Discarded);
        assert_eq!(manager.phase(), SessionPhase::Reconnecting);
        assert_eq!(
            manager.session().map(|s| s.state),
            Some(SessionState::Disconnected)
        );

        manager.reconnect().await.unwrap();
        assert_eq!(manager.phase(), SessionPhase::Connected);
        assert_eq!(manager.send(&report()).await.unwrap(), SendOutcome::Sent);
        assert_eq!(probe.connects(), 2);
        // discovery is not repeated on reconnect
        assert_eq!(probe.discover_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_failure_discards_report() {
        let transport = MockTransport::with_config(MockTransportConfig {
            write_failures: 1,
            ..Default::default()
        });
        let (_tx, rx) = watch::channel(false);
        let mut manager = SessionManager::new(transport, policy(), rx);
        manager.establish().await.unwrap();

        assert_eq!(manager.send(&report()).await.unwrap(), SendOutcome::Discarded);
        assert_eq!(manager.phase(), SessionPhase::Reconnecting);
        assert_eq!(manager.metrics().link_losses(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_finite_report_is_wire_error() {
        let (_tx, rx) = watch::channel(false);
        let mut manager = SessionManager::new(MockTransport::new(), policy(), rx);
        manager.establish().await.unwrap();

        let bad = ProximityReport::present(f64::NAN, 10.0, 5.0);
        assert!(matches!(
            manager.send(&bad).await,
            Err(SessionError::Wire(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_discovery() {
        let transport = MockTransport::with_config(MockTransportConfig {
            discovery_misses: u32::MAX,
            ..Default::default()
        });
        let (tx, rx) = watch::channel(false);
        let mut manager = SessionManager::new(transport, policy(), rx);

        let stopper = tokio::spawn(async move {
            sleep(Duration::from_secs(3)).await;
            let _ = tx.send(true);
        });

        assert!(matches!(manager.discover().await, Err(SessionError::Shutdown)));
        stopper.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_ends_closed() {
        let transport = MockTransport::new();
        let probe = transport.probe();
        let (_tx, rx) = watch::channel(false);
        let mut manager = SessionManager::new(transport, policy(), rx);
        manager.establish().await.unwrap();

        manager.close().await;
        assert_eq!(manager.phase(), SessionPhase::Closed);
        assert_eq!(probe.disconnects(), 1);
        assert!(matches!(
            manager.ensure_connected().await,
            Err(SessionError::Shutdown)
        ));

        // closing twice is a no-op
        manager.close().await;
        assert_eq!(probe.disconnects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_write_counts_as_link_loss() {
        let transport = MockTransport::with_config(MockTransportConfig {
            write_hangs: 1,
            ..Default::default()
        });
        let probe = transport.probe();
        let (_tx, rx) = watch::channel(false);
        let mut manager = SessionManager::new(transport, policy(), rx);
        manager.establish().await.unwrap();

        let started = tokio::time::Instant::now();
        assert_eq!(manager.send(&report()).await.unwrap(), SendOutcome::Discarded);
        assert!(started.elapsed() >= policy().write_timeout);
        assert_eq!(manager.phase(), SessionPhase::Reconnecting);
        assert_eq!(manager.metrics().link_losses(), 1);

        manager.reconnect().await.unwrap();
        assert_eq!(manager.send(&report()).await.unwrap(), SendOutcome::Sent);
        assert_eq!(probe.frame_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_hung_write() {
        let transport = MockTransport::with_config(MockTransportConfig {
            write_hangs: 1,
            ..Default::default()
        });
        let (tx, rx) = watch::channel(false);
        let mut p = policy();
        p.write_timeout = Duration::from_secs(3600);
        let mut manager = SessionManager::new(transport, p, rx);
        manager.establish().await.unwrap();

        let stopper = tokio::spawn(async move {
            sleep(Duration::from_millis(100)).await;
            let _ = tx.send(true);
        });

        let started = tokio::time::Instant::now();
        assert!(matches!(
            manager.send(&report()).await,
            Err(SessionError::Shutdown)
        ));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(manager.metrics().discarded_count(), 1);

        manager.close().await;
        assert_eq!(manager.phase(), SessionPhase::Closed);
        stopper.await.unwrap();
    }
}
