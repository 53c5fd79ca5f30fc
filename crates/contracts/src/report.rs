//! ProximityReport - Fusion output
//!
//! One report per tick, consumed by the session layer in the same tick.

use serde::{Deserialize, Serialize};

/// Hazard signal carried in the first wire field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HazardSignal {
    /// No computable hazard distance (safe default)
    #[default]
    Clear,
    /// Hand and hazard both observed
    Present,
}

impl HazardSignal {
    /// Wire code (`0` / `1`)
    pub fn code(&self) -> u8 {
        match self {
            HazardSignal::Clear => 0,
            HazardSignal::Present => 1,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(HazardSignal::Clear),
            1 => Some(HazardSignal::Present),
            _ => None,
        }
    }
}

/// Fused hand-to-hazard proximity for one tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProximityReport {
    pub signal: HazardSignal,

    /// Distance in cm; zero or negative when invalid or inside the hazard
    pub distance_cm: f64,

    /// Outer haptic threshold (cm)
    pub outer_threshold_cm: f64,

    /// Inner haptic threshold (cm)
    pub inner_threshold_cm: f64,
}

impl ProximityReport {
    /// Clear report with zero distance
    pub fn clear(outer_threshold_cm: f64, inner_threshold_cm: f64) -> Self {
        Self {
            signal: HazardSignal::Clear,
            distance_cm: 0.0,
            outer_threshold_cm,
            inner_threshold_cm,
        }
    }

    pub fn present(distance_cm: f64, outer_threshold_cm: f64, inner_threshold_cm: f64) -> Self {
        Self {
            signal: HazardSignal::Present,
            distance_cm,
            outer_threshold_cm,
            inner_threshold_cm,
        }
    }

    pub fn is_present(&self) -> bool {
        self.signal == HazardSignal::Present
    }
}
