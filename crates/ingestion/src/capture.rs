//! Capture loop: observe → publish → wait for release, until shutdown or retirement

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use contracts::{Observation, SensorFault, SourceId};
use sync_engine::{BarrierError, SourcePort};
use tracing::{debug, error, info, warn};

use crate::{CaptureMetrics, ObservationSource};

/// Why a capture loop ended
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureExit {
    /// Barrier shut down
    Shutdown,
    /// Slot retired after a fatal fault or too many consecutive faults
    Retired { fault: SensorFault },
    /// Barrier refused the observation
    Barrier(BarrierError),
}

/// Capture loop settings
#[derive(Debug, Clone, Copy)]
pub struct CaptureOptions {
    /// Consecutive faults that retire the slot
    pub max_consecutive_faults: u32,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            max_consecutive_faults: 50,
        }
    }
}

fn fault_kind(fault: &SensorFault) -> &'static str {
    match fault {
        SensorFault::NoData { .. } => "no_data",
        SensorFault::Disconnected { .. } => "disconnected",
        SensorFault::Detector { .. } => "detector",
    }
}

/// 线程 panic 时退役 slot，避免 barrier 永远等待该 source
struct RetireOnPanic<'a> {
    source_id: SourceId,
    port: &'a SourcePort,
}

impl Drop for RetireOnPanic<'_> {
    fn drop(&mut self) {
        if !thread::panicking() {
            return;
        }
        error!(source = %self.source_id, "capture loop panicked, retiring source");
        if let Err(e) = self.port.retire() {
            warn!(source = %self.source_id, error = %e, "retire after panic failed");
        }
    }
}

/// Run the unbounded capture loop of one source
///
/// A recoverable fault publishes the empty sentinel for the tick. A fatal
/// fault, or `max_consecutive_faults` in a row, retires the slot. So does a
/// panic in the source while the thread unwinds.
pub fn run_capture_loop<S: ObservationSource + ?Sized>(
    source: &mut S,
    port: &SourcePort,
    options: CaptureOptions,
    metrics: &CaptureMetrics,
) -> CaptureExit {
    let source_id = source.source_id();
    let _retire_on_panic = RetireOnPanic { source_id, port };
    let mut consecutive_faults = 0u32;
    info!(source = %source_id, "capture loop started");

    let exit = loop {
        if port.is_shutdown() {
            break CaptureExit::Shutdown;
        }

        let observation = match source.observe() {
            Ok(observation) => {
                consecutive_faults = 0;
                observation
            }
            Err(fault) => {
                consecutive_faults += 1;
                metrics.record_fault();
                observability::record_sensor_fault(source_id, fault_kind(&fault));

                if fault.is_fatal() || consecutive_faults >= options.max_consecutive_faults {
                    error!(
                        source = %source_id,
                        consecutive_faults,
                        error = %fault,
                        "retiring source"
                    );
                    if let Err(e) = port.retire() {
                        break CaptureExit::Barrier(e);
                    }
                    break CaptureExit::Retired { fault };
                }

                warn!(source = %source_id, consecutive_faults, error = %fault, "sensor fault");
                metrics.record_sentinel();
                Observation::empty(source_id)
            }
        };

        let count = observation.count();
        match port.publish(observation) {
            Ok(tick) => {
                metrics.record_published(count);
                observability::record_observation(source_id, count);
                debug!(source = %source_id, tick, count, "tick released");
            }
            Err(BarrierError::Shutdown) => break CaptureExit::Shutdown,
            Err(e) => break CaptureExit::Barrier(e),
        }
    };

    info!(source = %source_id, exit = ?exit, "capture loop stopped");
    exit
}

/// Run the capture loop on a named OS thread
///
/// The source is dropped on that thread when the loop ends, which releases its driver.
pub fn spawn_capture_thread<S>(
    mut source: S,
    port: SourcePort,
    options: CaptureOptions,
    metrics: Arc<CaptureMetrics>,
) -> std::io::Result<JoinHandle<CaptureExit>>
where
    S: ObservationSource + 'static,
{
    let name = format!("capture-{}", source.source_id());
    thread::Builder::new()
        .name(name)
        .spawn(move || run_capture_loop(&mut source, &port, options, &metrics))
}
