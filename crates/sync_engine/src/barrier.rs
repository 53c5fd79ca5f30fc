//! Double-handshake barrier between the two capture loops and the consumer.
//!
//! Producer: `signal_ready` → `wait_released`. Consumer: `wait_for_tick` →
//! fuse/send → `release_tick`. A mutex-guarded [`TickBuffer`] plus one
//! condvar per side.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use contracts::{Observation, SourceId, TickSnapshot};
use tracing::{debug, info, trace};

use crate::{BarrierError, TickBuffer};

/// Two-producer/one-consumer tick gate
#[derive(Debug, Default)]
pub struct SyncBarrier {
    state: Mutex<TickBuffer>,
    /// Producers wait here for the release of their tick
    released: Condvar,
    /// The consumer waits here for a complete tick
    ready: Condvar,
}

impl SyncBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared barrier plus one port per source
    pub fn with_ports() -> (Arc<Self>, SourcePort, SourcePort) {
        let barrier = Arc::new(Self::new());
        let visual = SourcePort::new(Arc::clone(&barrier), SourceId::Visual);
        let thermal = SourcePort::new(Arc::clone(&barrier), SourceId::Thermal);
        (barrier, visual, thermal)
    }

    fn lock(&self) -> Result<MutexGuard<'_, TickBuffer>, BarrierError> {
        self.state.lock().map_err(|_| BarrierError::Poisoned)
    }

    /// Publish an observation for the current tick
    ///
    /// Blocks while the source's slot still holds an unreleased value.
    pub fn signal_ready(&self, observation: Observation) -> Result<u64, BarrierError> {
        let source = observation.source_id();
        let mut state = self.lock()?;

        loop {
            if state.is_shutdown() {
                return Err(BarrierError::Shutdown);
            }
            if state.is_retired(source) {
                return Err(BarrierError::Retired { source_id: source });
            }
            if !state.is_ready(source) {
                break;
            }
            state = self
                .released
                .wait(state)
                .map_err(|_| BarrierError::Poisoned)?;
        }

        let count = observation.count();
        let tick = state.store(observation);
        trace!(tick, source = %source, count, "observation published");

        if state.is_complete() {
            self.ready.notify_all();
        }
        Ok(tick)
    }

    /// Block until the consumer has released `tick`
    pub fn wait_released(&self, source: SourceId, tick: u64) -> Result<(), BarrierError> {
        let mut state = self.lock()?;
        while state.tick() <= tick {
            if state.is_shutdown() {
                return Err(BarrierError::Shutdown);
            }
            state = self
                .released
                .wait(state)
                .map_err(|_| BarrierError::Poisoned)?;
        }
        trace!(tick, source = %source, "tick released");
        Ok(())
    }

    /// Block until both slots are ready or retired
    pub fn wait_for_tick(&self) -> Result<TickSnapshot, BarrierError> {
        let mut state = self.lock()?;
        loop {
            if let Some(result) = Self::poll_complete(&state) {
                return result;
            }
            state = self.ready.wait(state).map_err(|_| BarrierError::Poisoned)?;
        }
    }

    /// [`wait_for_tick`](Self::wait_for_tick) with a deadline
    pub fn wait_for_tick_timeout(&self, timeout: Duration) -> Result<TickSnapshot, BarrierError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock()?;
        loop {
            if let Some(result) = Self::poll_complete(&state) {
                return result;
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(BarrierError::Timeout {
                    waited_ms: timeout.as_millis() as u64,
                });
            }
            let (guard, _) = self
                .ready
                .wait_timeout(state, deadline - now)
                .map_err(|_| BarrierError::Poisoned)?;
            state = guard;
        }
    }

    fn poll_complete(state: &TickBuffer) -> Option<Result<TickSnapshot, BarrierError>> {
        if state.is_shutdown() {
            return Some(Err(BarrierError::Shutdown));
        }
        if state.is_exhausted() {
            return Some(Err(BarrierError::Exhausted));
        }
        if state.is_complete() {
            return Some(Ok(state.snapshot()));
        }
        None
    }

    /// Release the current tick and wake the producers
    pub fn release_tick(&self, tick: u64) -> Result<(), BarrierError> {
        let mut state = self.lock()?;
        if state.is_shutdown() {
            return Err(BarrierError::Shutdown);
        }
        if state.tick() != tick {
            return Err(BarrierError::TickMismatch {
                expected: state.tick(),
                got: tick,
            });
        }
        state.release();
        metrics::counter!("eyecan_barrier_ticks_released_total").increment(1);
        self.released.notify_all();
        Ok(())
    }

    /// Terminal fault: the slot counts as ready and empty from now on
    pub fn retire(&self, source: SourceId) -> Result<(), BarrierError> {
        let mut state = self.lock()?;
        if state.is_retired(source) {
            return Ok(());
        }
        state.retire(source);
        info!(source = %source, tick = state.tick(), "source retired");
        metrics::counter!("eyecan_barrier_retired_total", "source" => source.as_str())
            .increment(1);

        self.ready.notify_all();
        self.released.notify_all();
        Ok(())
    }

    /// Wake every blocked call with [`BarrierError::Shutdown`]
    pub fn shutdown(&self) {
        // A poisoned buffer still has to wake its waiters
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !state.is_shutdown() {
            state.set_shutdown();
            debug!(tick = state.tick(), "sync barrier shutdown");
        }
        drop(state);
        self.ready.notify_all();
        self.released.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.lock().map(|s| s.is_shutdown()).unwrap_or(true)
    }

    /// Current tick number
    pub fn current_tick(&self) -> Result<u64, BarrierError> {
        Ok(self.lock()?.tick())
    }
}

/// Per-source handle used by capture loops
#[derive(Debug, Clone)]
pub struct SourcePort {
    barrier: Arc<SyncBarrier>,
    source: SourceId,
}

impl SourcePort {
    pub fn new(barrier: Arc<SyncBarrier>, source: SourceId) -> Self {
        Self { barrier, source }
    }

    pub fn source_id(&self) -> SourceId {
        self.source
    }

    /// `signal_ready` followed by `wait_released`, returns the published tick
    pub fn publish(&self, observation: Observation) -> Result<u64, BarrierError> {
        let got = observation.source_id();
        if got != self.source {
            return Err(BarrierError::WrongSource {
                expected: self.source,
                got,
            });
        }
        let tick = self.barrier.signal_ready(observation)?;
        self.barrier.wait_released(self.source, tick)?;
        Ok(tick)
    }

    /// Publish the empty sentinel for this source
    pub fn publish_empty(&self) -> Result<u64, BarrierError> {
        self.publish(Observation::empty(self.source))
    }

    pub fn retire(&self) -> Result<(), BarrierError> {
        self.barrier.retire(self.source)
    }

    pub fn is_shutdown(&self) -> bool {
        self.barrier.is_shutdown()
    }

    pub fn barrier(&self) -> &Arc<SyncBarrier> {
        &self.barrier
    }
}
