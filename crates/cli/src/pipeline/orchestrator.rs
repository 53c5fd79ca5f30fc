//! Pipeline orchestrator - coordinates all components.
//!
//! Two capture threads feed the sync barrier, the tick consumer fuses every
//! tick and hands the report to the session worker.

use std::future::Future;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{DepthModel, DeviceBlueprint, LinkTransport};
use dispatcher::{ConsumerExit, SessionHandle, SessionManager, SessionPolicy, TickConsumer};
use fusion::FusionEngine;
use ingestion::{
    build_thermal_source, build_visual_source, calibrate_depth, spawn_capture_thread,
    CaptureExit, CaptureMetrics, CaptureOptions, DynVisualSource,
};
use link::ConfiguredTransport;
use sync_engine::SyncBarrier;
use tokio::sync::watch;
use tracing::{info, warn};

use super::PipelineStats;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The device blueprint configuration
    pub blueprint: DeviceBlueprint,

    /// Maximum number of ticks (None = unlimited)
    pub max_ticks: Option<u64>,

    /// Pipeline timeout (None = no timeout)
    pub timeout: Option<Duration>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline until the tick limit, the timeout, source exhaustion
    /// or `stop` resolves
    pub async fn run<F>(self, stop: F) -> Result<PipelineStats>
    where
        F: Future<Output = ()>,
    {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // Sources
        let visual = build_visual_source(blueprint).context("Failed to build visual source")?;
        let thermal = build_thermal_source(blueprint).context("Failed to build thermal source")?;

        // Depth model
        let (visual, engine, calibrated) = build_engine(blueprint, visual).await?;
        info!(
            depth = engine.depth_model().is_some(),
            calibrated,
            scale_factor = engine.config().scale_factor,
            "Fusion engine ready"
        );

        // Capture threads
        let (barrier, visual_port, thermal_port) = SyncBarrier::with_ports();
        let visual_metrics = Arc::new(CaptureMetrics::new());
        let thermal_metrics = Arc::new(CaptureMetrics::new());

        let visual_thread = spawn_capture_thread(
            visual,
            visual_port,
            CaptureOptions {
                max_consecutive_faults: blueprint.sources.visual.max_consecutive_faults,
            },
            Arc::clone(&visual_metrics),
        )
        .context("Failed to spawn visual capture thread")?;
        let thermal_thread = spawn_capture_thread(
            thermal,
            thermal_port,
            CaptureOptions {
                max_consecutive_faults: blueprint.sources.thermal.max_consecutive_faults,
            },
            Arc::clone(&thermal_metrics),
        )
        .context("Failed to spawn thermal capture thread")?;

        // Session
        let transport = ConfiguredTransport::from_config(&blueprint.link);
        info!(
            transport = %transport.name(),
            peer_filter = %blueprint.link.peer_name_filter,
            "Starting session"
        );
        let manager = SessionManager::new(
            transport,
            SessionPolicy::from(&blueprint.link),
            shutdown_rx.clone(),
        );
        let session = SessionHandle::spawn(manager, shutdown_rx.clone());

        // Consumer
        let consumer = TickConsumer::new(Arc::clone(&barrier), Arc::new(engine), shutdown_rx)
            .with_max_ticks(self.config.max_ticks);
        info!(max_ticks = ?self.config.max_ticks, "Pipeline running");

        let consumed = {
            let consumer_run = consumer.run(&session);
            tokio::pin!(consumer_run);

            let stop_reason = async {
                tokio::select! {
                    _ = stop => "signal",
                    _ = deadline(self.config.timeout) => "timeout",
                }
            };

            tokio::select! {
                result = &mut consumer_run => result,
                reason = stop_reason => {
                    warn!(reason, "Stopping pipeline");
                    shutdown_tx.send_replace(true);
                    barrier.shutdown();
                    consumer_run.await
                }
            }
        };

        // Shutdown
        info!("Shutting down pipeline...");
        shutdown_tx.send_replace(true);
        barrier.shutdown();

        let session_metrics = Arc::clone(session.metrics());
        let session_phase = session.shutdown().await;
        let visual_exit = join_capture(visual_thread).await;
        let thermal_exit = join_capture(thermal_thread).await;

        let report = consumed.context("Tick consumer failed")?;
        let stats = PipelineStats {
            ticks: report.ticks,
            exit: report.exit,
            duration: start_time.elapsed(),
            calibrated,
            session: session_metrics.snapshot(),
            session_phase,
            visual: visual_metrics.snapshot(),
            thermal: thermal_metrics.snapshot(),
            visual_exit,
            thermal_exit,
            summary: report.summary,
        };

        info!(
            ticks = stats.ticks,
            exit = ?stats.exit,
            duration_secs = stats.duration.as_secs_f64(),
            tick_rate = format!("{:.2}", stats.tick_rate()),
            "Pipeline shutdown complete"
        );
        if stats.exit == ConsumerExit::Exhausted {
            warn!("Both sources retired before the pipeline was stopped");
        }

        Ok(stats)
    }
}

/// Fusion engine for the blueprint, calibrating the depth model if enabled
///
/// A failed calibration falls back to the configured model.
async fn build_engine(
    blueprint: &DeviceBlueprint,
    mut visual: DynVisualSource,
) -> Result<(DynVisualSource, FusionEngine, bool)> {
    let fusion = blueprint.fusion.clone();
    if !(fusion.depth.enabled && blueprint.calibration.enabled) {
        return Ok((visual, FusionEngine::new(fusion), false));
    }

    let calibration = blueprint.calibration.clone();
    info!(
        hand_height_cm = calibration.hand_height_cm,
        max_attempts = calibration.max_attempts,
        "Running depth calibration"
    );
    let (visual, spacings) = tokio::task::spawn_blocking(move || {
        let (camera, detector) = visual.drivers_mut();
        let spacings = calibrate_depth(camera, detector, &calibration);
        (visual, spacings)
    })
    .await
    .context("Calibration task failed")?;

    let model = spacings
        .map_err(anyhow::Error::from)
        .and_then(|s| {
            DepthModel::from_calibration(s, blueprint.calibration.hand_height_cm)
                .map_err(anyhow::Error::from)
        });

    match model {
        Ok(model) => {
            info!(slope = model.slope, offset = model.offset, "Depth model calibrated");
            Ok((visual, FusionEngine::with_depth_model(fusion, model), true))
        }
        Err(e) => {
            let fallback = fusion.depth.default_model();
            warn!(
                error = %e,
                slope = fallback.slope,
                offset = fallback.offset,
                "Depth calibration failed, using configured model"
            );
            Ok((visual, FusionEngine::new(fusion), false))
        }
    }
}

/// Resolves after `timeout`, never without one
async fn deadline(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending().await,
    }
}

async fn join_capture(handle: JoinHandle<CaptureExit>) -> Option<CaptureExit> {
    let name = handle.thread().name().unwrap_or("capture").to_string();
    match tokio::task::spawn_blocking(move || handle.join()).await {
        Ok(Ok(exit)) => Some(exit),
        Ok(Err(_)) => {
            warn!(thread = %name, "Capture thread panicked");
            None
        }
        Err(e) => {
            warn!(thread = %name, error = %e, "Failed to join capture thread");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SourceDriver;

    fn fast_blueprint() -> DeviceBlueprint {
        let mut bp = DeviceBlueprint::default();
        bp.simulation.frame_interval_ms = 0;
        bp
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_pipeline_runs_to_max_ticks() {
        let pipeline = Pipeline::new(PipelineConfig {
            blueprint: fast_blueprint(),
            max_ticks: Some(25),
            timeout: Some(Duration::from_secs(30)),
        });

        let stats = pipeline.run(std::future::pending()).await.unwrap();
        assert_eq!(stats.exit, ConsumerExit::MaxTicks);
        assert_eq!(stats.ticks, 25);
        assert_eq!(stats.summary.total_ticks, 25);
        assert_eq!(stats.visual_exit, Some(CaptureExit::Shutdown));
        assert_eq!(stats.thermal_exit, Some(CaptureExit::Shutdown));
        assert!(!stats.calibrated);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_pipeline_stops_on_signal() {
        let mut blueprint = fast_blueprint();
        blueprint.simulation.frame_interval_ms = 5;
        let pipeline = Pipeline::new(PipelineConfig {
            blueprint,
            max_ticks: None,
            timeout: None,
        });

        let stop = tokio::time::sleep(Duration::from_millis(200));
        let stats = pipeline.run(stop).await.unwrap();
        assert_eq!(stats.exit, ConsumerExit::Shutdown);
        assert_eq!(stats.session_phase, dispatcher::SessionPhase::Closed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_calibration_falls_back_on_flat_spacing() {
        let mut blueprint = fast_blueprint();
        blueprint.calibration.enabled = true;
        blueprint.calibration.settle_ms = 0;
        assert_eq!(blueprint.sources.visual.driver, SourceDriver::Simulated);

        let pipeline = Pipeline::new(PipelineConfig {
            blueprint,
            max_ticks: Some(3),
            timeout: Some(Duration::from_secs(30)),
        });

        // simulated hands keep a constant spacing, so the model cannot be fitted
        let stats = pipeline.run(std::future::pending()).await.unwrap();
        assert!(!stats.calibrated);
        assert_eq!(stats.ticks, 3);
    }
}
