//! # Ingestion
//!
//! Observation sources and their capture loops.
//!
//! Responsibilities:
//! - Wrap camera drivers and detectors into `ObservationSource`s
//! - Project hand landmarks into the hazard frame
//! - Filter and cap hazard contours
//! - Run each source on its own OS thread, gated by the sync barrier
//! - Depth calibration routine
//! - Simulated and replay drivers
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{build_thermal_source, spawn_capture_thread, CaptureMetrics, CaptureOptions};
//! use sync_engine::SyncBarrier;
//!
//! let (barrier, visual_port, thermal_port) = SyncBarrier::with_ports();
//! let thermal = build_thermal_source(&blueprint)?;
//! let handle = spawn_capture_thread(
//!     thermal,
//!     thermal_port,
//!     CaptureOptions::default(),
//!     Arc::new(CaptureMetrics::new()),
//! )?;
//! ```

mod blob;
mod calibration;
mod capture;
mod error;
mod factory;
mod metrics;
pub mod replay;
pub mod sim;
mod source;
mod thermal;
mod visual;

// Re-exports
pub use blob::BlobHazardDetector;
pub use calibration::calibrate_depth;
pub use capture::{run_capture_loop, spawn_capture_thread, CaptureExit, CaptureOptions};
pub use error::{IngestionError, Result};
pub use factory::{build_thermal_source, build_visual_source, DynThermalSource, DynVisualSource};
pub use metrics::{CaptureMetrics, CaptureMetricsSnapshot};
pub use source::ObservationSource;
pub use thermal::ThermalHazardSource;
pub use visual::{landmark_spacing, VisualHandSource};
