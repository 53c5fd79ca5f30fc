//! Pipeline statistics and metrics.

use std::time::Duration;

use dispatcher::{ConsumerExit, SessionMetricsSnapshot, SessionPhase};
use ingestion::{CaptureExit, CaptureMetricsSnapshot};
use observability::MetricsSummary;

/// Statistics from a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineStats {
    /// Ticks fused and released
    pub ticks: u64,

    /// Why the consumer stopped
    pub exit: ConsumerExit,

    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Whether the depth model came from the calibration routine
    pub calibrated: bool,

    pub session: SessionMetricsSnapshot,
    pub session_phase: SessionPhase,

    pub visual: CaptureMetricsSnapshot,
    pub thermal: CaptureMetricsSnapshot,

    /// None if the capture thread panicked
    pub visual_exit: Option<CaptureExit>,
    pub thermal_exit: Option<CaptureExit>,

    /// Fusion metrics aggregator output
    pub summary: MetricsSummary,
}

impl PipelineStats {
    /// Ticks per second
    pub fn tick_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.ticks as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Share of fused reports that reached the transport, in percent
    pub fn delivery_rate(&self) -> f64 {
        if self.ticks > 0 {
            (self.session.frames_sent as f64 / self.ticks as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Pipeline Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Ticks: {} ({:?})", self.ticks, self.exit);
        println!("   ├─ Tick rate: {:.2}/s", self.tick_rate());
        println!("   └─ Depth model: {}", if self.calibrated { "calibrated" } else { "configured" });

        println!("\n📷 Sources");
        print_source("visual", &self.visual, self.visual_exit.as_ref(), false);
        print_source("thermal", &self.thermal, self.thermal_exit.as_ref(), true);

        let summary = &self.summary;
        println!("\n📈 Fusion");
        println!(
            "   ├─ Present reports: {} ({:.2}%)",
            summary.present_reports, summary.present_rate
        );
        println!("   ├─ Inside inner threshold: {}", summary.inner_reports);
        println!("   ├─ Distance (cm): {}", summary.distance_cm);
        println!("   └─ Tick latency (ms): {}", summary.tick_latency_ms);

        let session = &self.session;
        println!("\n📡 Link ({})", self.session_phase);
        println!(
            "   ├─ Frames sent: {} ({:.2}%)",
            session.frames_sent,
            self.delivery_rate()
        );
        println!("   ├─ Discarded: {}", session.discarded_count);
        println!("   ├─ Queue full: {}", session.dropped_count);
        println!("   ├─ Stale after reconnect: {}", session.stale_count);
        println!(
            "   ├─ Connect attempts: {} ({} failed)",
            session.connect_attempts, session.connect_failures
        );
        println!("   └─ Link losses: {}", session.link_losses);

        println!();
    }
}

fn print_source(name: &str, metrics: &CaptureMetricsSnapshot, exit: Option<&CaptureExit>, last: bool) {
    let prefix = if last { "└─" } else { "├─" };
    let exit = match exit {
        Some(CaptureExit::Shutdown) => "shutdown".to_string(),
        Some(CaptureExit::Retired { fault }) => format!("retired: {fault}"),
        Some(CaptureExit::Barrier(e)) => format!("barrier: {e}"),
        None => "panicked".to_string(),
    };
    println!(
        "   {prefix} {name}: {} published, {} detections, {} faults ({exit})",
        metrics.published, metrics.detections, metrics.faults
    );
}
