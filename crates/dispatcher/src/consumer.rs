//! TickConsumer - 融合消费者
//!
//! 每个 tick：等待配对完成 → 融合 → 提交给 session → 释放 tick。

use std::sync::Arc;
use std::time::{Duration, Instant};

use fusion::FusionEngine;
use observability::metrics::{record_report, record_tick_latency_ms, MetricsSummary, ProximityAggregator};
use serde::Serialize;
use sync_engine::{BarrierError, SyncBarrier};
use tokio::sync::watch;
use tracing::{debug, info, instrument, trace};

use crate::error::SessionError;
use crate::handle::SessionHandle;

/// How often a blocked consumer re-checks the shutdown signal
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Why the consumer loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumerExit {
    /// Tick limit reached
    MaxTicks,
    /// Shutdown signal or barrier shutdown
    Shutdown,
    /// Both sources retired
    Exhausted,
}

/// Consumer run result
#[derive(Debug, Clone)]
pub struct ConsumerReport {
    pub exit: ConsumerExit,
    /// Ticks fused and released
    pub ticks: u64,
    pub summary: MetricsSummary,
}

/// Fusion consumer over one barrier
pub struct TickConsumer {
    barrier: Arc<SyncBarrier>,
    engine: Arc<FusionEngine>,
    shutdown: watch::Receiver<bool>,
    max_ticks: Option<u64>,
    aggregator: ProximityAggregator,
}

impl TickConsumer {
    pub fn new(
        barrier: Arc<SyncBarrier>,
        engine: Arc<FusionEngine>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            barrier,
            engine,
            shutdown,
            max_ticks: None,
            aggregator: ProximityAggregator::new(),
        }
    }

    /// Stop after `max_ticks` released ticks
    pub fn with_max_ticks(mut self, max_ticks: Option<u64>) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    fn stop_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Wait for the next complete tick off the async runtime
    async fn next_tick(&self) -> Result<contracts::TickSnapshot, SessionError> {
        loop {
            if self.stop_requested() {
                return Err(SessionError::Shutdown);
            }
            let barrier = Arc::clone(&self.barrier);
            let waited =
                tokio::task::spawn_blocking(move || barrier.wait_for_tick_timeout(SHUTDOWN_POLL))
                    .await?;
            match waited {
                Ok(snapshot) => return Ok(snapshot),
                Err(BarrierError::Timeout { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Run until shutdown, exhaustion or the tick limit
    ///
    /// # Errors
    /// Barrier failures other than shutdown and exhaustion.
    #[instrument(name = "tick_consumer_loop", skip(self, session), fields(session = %session.name()))]
    pub async fn run(mut self, session: &SessionHandle) -> Result<ConsumerReport, SessionError> {
        let mut ticks = 0u64;

        let exit = loop {
            if self.max_ticks.is_some_and(|max| ticks >= max) {
                break ConsumerExit::MaxTicks;
            }

            let snapshot = match self.next_tick().await {
                Ok(snapshot) => snapshot,
                Err(SessionError::Shutdown) | Err(SessionError::Barrier(BarrierError::Shutdown)) => {
                    break ConsumerExit::Shutdown
                }
                Err(SessionError::Barrier(BarrierError::Exhausted)) => {
                    break ConsumerExit::Exhausted
                }
                Err(e) => return Err(e),
            };
            let paired_at = Instant::now();

            let report = self.engine.fuse_snapshot(&snapshot);
            record_report(&report, snapshot.tick);
            trace!(
                tick = snapshot.tick,
                hands = snapshot.hand.value.count(),
                hazards = snapshot.hazard.value.count(),
                signal = report.signal.code(),
                distance_cm = report.distance_cm,
                "tick fused"
            );

            let accepted = session.submit(report);

            match self.barrier.release_tick(snapshot.tick) {
                Ok(()) => {}
                Err(BarrierError::Shutdown) => break ConsumerExit::Shutdown,
                Err(e) => return Err(e.into()),
            }

            let latency_ms = paired_at.elapsed().as_secs_f64() * 1000.0;
            record_tick_latency_ms(latency_ms);
            self.aggregator.update(&report, latency_ms);
            if !accepted {
                self.aggregator.record_discarded();
            }
            ticks += 1;
        };

        info!(ticks, exit = ?exit, "tick consumer stopped");
        debug!(summary = %self.aggregator.summary(), "proximity summary");
        Ok(ConsumerReport {
            exit,
            ticks,
            summary: self.aggregator.summary(),
        })
    }
}
