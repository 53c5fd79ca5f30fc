//! Depth calibration contracts
//!
//! The hand's own apparent size is the depth proxy: the normalized spacing
//! between wrist and index knuckle grows as the hand rises toward the camera.

use serde::{Deserialize, Serialize};

use crate::ContractError;

/// Default slope (cm per normalized spacing unit), uncalibrated
pub const DEFAULT_DEPTH_SLOPE: f64 = 232.0;

/// Default spacing at surface level, uncalibrated
pub const DEFAULT_DEPTH_OFFSET: f64 = 0.125;

/// Spacings recorded by the two-stage calibration routine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSpacings {
    /// Hand resting on the work surface
    pub surface: f64,
    /// Hand raised by the calibration height
    pub raised: f64,
}

/// Linear spacing → height model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthModel {
    pub slope: f64,
    pub offset: f64,
}

impl Default for DepthModel {
    fn default() -> Self {
        Self {
            slope: DEFAULT_DEPTH_SLOPE,
            offset: DEFAULT_DEPTH_OFFSET,
        }
    }
}

impl DepthModel {
    /// Interpolate between the two recorded spacings
    ///
    /// # Errors
    /// The raised spacing must be strictly larger than the surface spacing.
    pub fn from_calibration(
        spacings: CalibrationSpacings,
        hand_height_cm: f64,
    ) -> Result<Self, ContractError> {
        let span = spacings.raised - spacings.surface;
        if span <= 0.0 || !span.is_finite() {
            return Err(ContractError::config_validation(
                "calibration",
                format!(
                    "raised spacing ({}) must exceed surface spacing ({})",
                    spacings.raised, spacings.surface
                ),
            ));
        }
        Ok(Self {
            slope: hand_height_cm / span,
            offset: spacings.surface,
        })
    }

    /// Estimated hand height above the surface in cm
    pub fn height_cm(&self, spacing: f64) -> f64 {
        self.slope * (spacing - self.offset)
    }
}
