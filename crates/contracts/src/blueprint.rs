//! DeviceBlueprint - Config Loader output
//!
//! Complete device configuration: fusion calibration, source limits, link
//! policy and the simulated scenario used when no hardware is attached.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

use crate::{DepthModel, DEFAULT_DEPTH_OFFSET, DEFAULT_DEPTH_SLOPE};

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete device configuration blueprint
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct DeviceBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Fusion calibration constants
    #[serde(default)]
    #[validate(nested)]
    pub fusion: FusionConfig,

    /// Depth calibration routine
    #[serde(default)]
    #[validate(nested)]
    pub calibration: CalibrationConfig,

    /// Observation source limits
    #[serde(default)]
    #[validate(nested)]
    pub sources: SourcesConfig,

    /// Wireless link policy
    #[serde(default)]
    #[validate(nested)]
    pub link: LinkConfig,

    /// Simulated drivers
    #[serde(default)]
    #[validate(nested)]
    pub simulation: SimulationConfig,
}

/// Fusion calibration constants
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct FusionConfig {
    /// Pixel → cm scale of the thermal frame
    #[validate(range(exclusive_min = 0.0))]
    pub scale_factor: f64,

    /// Outer haptic threshold (cm)
    #[validate(range(min = 0.0))]
    pub outer_threshold_cm: f64,

    /// Inner haptic threshold (cm), at most the outer threshold
    #[validate(range(min = 0.0))]
    pub inner_threshold_cm: f64,

    /// Height of the tallest expected hazard (cm), subtracted from 3D distance
    #[validate(range(min = 0.0))]
    pub hazard_height_offset_cm: f64,

    #[serde(default)]
    #[validate(nested)]
    pub depth: DepthConfig,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            scale_factor: 1.08,
            outer_threshold_cm: 10.0,
            inner_threshold_cm: 5.0,
            hazard_height_offset_cm: 10.0,
            depth: DepthConfig::default(),
        }
    }
}

/// Depth estimate settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DepthConfig {
    /// Combine planar distance with estimated hand height
    pub enabled: bool,

    /// Uncalibrated slope
    #[validate(range(exclusive_min = 0.0))]
    pub slope: f64,

    /// Uncalibrated surface spacing
    #[validate(range(min = 0.0, max = 1.0))]
    pub offset: f64,
}

impl Default for DepthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            slope: DEFAULT_DEPTH_SLOPE,
            offset: DEFAULT_DEPTH_OFFSET,
        }
    }
}

impl DepthConfig {
    /// Model used when no calibration was recorded
    pub fn default_model(&self) -> DepthModel {
        DepthModel {
            slope: self.slope,
            offset: self.offset,
        }
    }
}

/// Two-stage depth calibration routine
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Run calibration before starting the capture loops
    pub enabled: bool,

    /// Height difference between the two calibration poses (cm)
    #[validate(range(exclusive_min = 0.0))]
    pub hand_height_cm: f64,

    /// Pause between the surface and raised stages (ms)
    pub settle_ms: u64,

    /// Capture attempts per stage before giving up
    #[validate(range(min = 1))]
    pub max_attempts: u32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            hand_height_cm: 40.0,
            settle_ms: 3000,
            max_attempts: 200,
        }
    }
}

impl CalibrationConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// Observation source limits
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct SourcesConfig {
    #[serde(default)]
    #[validate(nested)]
    pub visual: VisualSourceConfig,

    #[serde(default)]
    #[validate(nested)]
    pub thermal: ThermalSourceConfig,
}

/// Driver behind an observation source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceDriver {
    /// Scripted drivers from `simulation`
    #[default]
    Simulated,
    /// Recorded JSONL file at `replay_path`
    Replay,
}

/// Hand tracker source
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct VisualSourceConfig {
    pub driver: SourceDriver,

    /// JSONL recording (`replay` driver only)
    pub replay_path: Option<PathBuf>,

    /// Restart the recording at end of file
    pub replay_loop: bool,

    /// Maximum tracked hands
    #[validate(range(min = 1, max = 4))]
    pub max_hands: usize,

    /// Width of the hazard frame landmarks are projected into (px)
    #[validate(range(min = 1))]
    pub frame_width: u32,

    /// Height of the hazard frame landmarks are projected into (px)
    #[validate(range(min = 1))]
    pub frame_height: u32,

    /// Consecutive faults before the source retires
    #[validate(range(min = 1))]
    pub max_consecutive_faults: u32,
}

impl Default for VisualSourceConfig {
    fn default() -> Self {
        Self {
            driver: SourceDriver::Simulated,
            replay_path: None,
            replay_loop: false,
            max_hands: 1,
            frame_width: 80,
            frame_height: 62,
            max_consecutive_faults: 50,
        }
    }
}

/// Thermal hazard source
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ThermalSourceConfig {
    pub driver: SourceDriver,

    /// JSONL recording (`replay` driver only)
    pub replay_path: Option<PathBuf>,

    /// Restart the recording at end of file
    pub replay_loop: bool,

    /// Hazard threshold temperature (°C)
    #[validate(range(min = -40.0, max = 500.0))]
    pub hazard_temp_c: f32,

    /// Maximum reported hazard contours
    #[validate(range(min = 1, max = 32))]
    pub max_hazards: usize,

    /// Contours at or below this area (px²) are noise
    #[validate(range(min = 0.0))]
    pub min_contour_area: f64,

    /// Consecutive faults before the source retires
    #[validate(range(min = 1))]
    pub max_consecutive_faults: u32,
}

impl Default for ThermalSourceConfig {
    fn default() -> Self {
        Self {
            driver: SourceDriver::Simulated,
            replay_path: None,
            replay_loop: false,
            hazard_temp_c: 40.0,
            max_hazards: 9,
            min_contour_area: 1.0,
            max_consecutive_faults: 50,
        }
    }
}

/// Transport implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Frames go to the log, link always up
    #[default]
    Log,
    /// Frames go to a TCP bridge peer
    TcpBridge,
}

/// Wireless link policy
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LinkConfig {
    pub transport: TransportKind,

    /// Case-sensitive substring of the peer's advertised name
    #[validate(length(min = 1))]
    pub peer_name_filter: String,

    /// Length of one discovery scan (ms)
    #[validate(range(min = 1))]
    pub scan_window_ms: u64,

    /// Pause between discovery scans (ms)
    pub scan_retry_ms: u64,

    /// Per-attempt connect timeout (ms)
    #[validate(range(min = 1))]
    pub connect_timeout_ms: u64,

    /// Pause between connect attempts (ms)
    pub backoff_ms: u64,

    /// Pause after connecting before the first write (ms)
    pub settle_ms: u64,

    /// Grace period for closing the session on shutdown (ms)
    pub shutdown_grace_ms: u64,

    /// Candidate bridge endpoints (`tcp_bridge` only)
    #[serde(default)]
    pub peers: Vec<String>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Log,
            peer_name_filter: "BLE-Server-EyeCan".to_string(),
            scan_window_ms: 5000,
            scan_retry_ms: 1000,
            connect_timeout_ms: 10_000,
            backoff_ms: 1000,
            settle_ms: 0,
            shutdown_grace_ms: 2000,
            peers: Vec::new(),
        }
    }
}

impl LinkConfig {
    pub fn scan_window(&self) -> Duration {
        Duration::from_millis(self.scan_window_ms)
    }

    pub fn scan_retry(&self) -> Duration {
        Duration::from_millis(self.scan_retry_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Hot rectangle rendered by the simulated thermal camera
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedHazard {
    /// Top-left corner (px, inclusive)
    pub min: [usize; 2],
    /// Bottom-right corner (px, inclusive)
    pub max: [usize; 2],
    pub temperature_c: f32,
}

/// Simulated drivers
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SimulationConfig {
    /// Frame pacing of the simulated drivers (ms)
    pub frame_interval_ms: u64,

    /// Background temperature (°C)
    pub ambient_c: f32,

    /// Hot regions
    #[serde(default)]
    pub hazards: Vec<SimulatedHazard>,

    /// Hand wrist waypoints, normalized image coordinates
    #[validate(length(min = 1))]
    pub hand_path: Vec<[f64; 2]>,

    /// Frames per waypoint segment
    #[validate(range(min = 1))]
    pub steps_per_segment: u32,

    /// Wrist/knuckle spacing reported by the simulated detector
    #[validate(range(min = 0.0, max = 1.0))]
    pub hand_spacing: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 50,
            ambient_c: 22.0,
            hazards: vec![SimulatedHazard {
                min: [34, 26],
                max: [46, 36],
                temperature_c: 65.0,
            }],
            hand_path: vec![[0.1, 0.1], [0.5, 0.5], [0.9, 0.2]],
            steps_per_segment: 40,
            hand_spacing: 0.125,
        }
    }
}

impl SimulationConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}
