//! Two-stage depth calibration
//!
//! Stage 1: hand resting on the work surface. Stage 2: hand raised by
//! `hand_height_cm`. Each stage keeps capturing until a hand with a
//! positive wrist/knuckle spacing shows up, at most `max_attempts` frames.

use contracts::{CalibrationConfig, CalibrationSpacings, FrameCamera, HandDetector, SourceId};
use tracing::{info, instrument, warn};

use crate::error::{IngestionError, Result};
use crate::landmark_spacing;

fn capture_spacing<C, D>(
    camera: &mut C,
    detector: &mut D,
    stage: &'static str,
    max_attempts: u32,
) -> Result<f64>
where
    C: FrameCamera + ?Sized,
    D: HandDetector + ?Sized,
{
    for attempt in 1..=max_attempts {
        let image = match camera.capture_frame() {
            Ok(image) => image,
            Err(fault) if fault.is_fatal() => return Err(fault.into()),
            Err(fault) => {
                warn!(stage, attempt, error = %fault, "calibration capture failed");
                continue;
            }
        };

        let hands = match detector.detect_hand_landmarks(&image, 1) {
            Ok(hands) => hands,
            Err(fault) if fault.is_fatal() => return Err(fault.into()),
            Err(fault) => {
                warn!(stage, attempt, error = %fault, "calibration detection failed");
                continue;
            }
        };

        if let Some(spacing) = hands
            .first()
            .and_then(|hand| landmark_spacing(hand))
            .filter(|s| *s > 0.0)
        {
            info!(stage, attempt, spacing, "calibration stage recorded");
            return Ok(spacing);
        }
    }

    Err(IngestionError::Calibration {
        stage,
        attempts: max_attempts,
    })
}

/// Record the surface and raised wrist/knuckle spacings
#[instrument(name = "calibrate_depth", skip(camera, detector), fields(source = %SourceId::Visual))]
pub fn calibrate_depth<C, D>(
    camera: &mut C,
    detector: &mut D,
    config: &CalibrationConfig,
) -> Result<CalibrationSpacings>
where
    C: FrameCamera + ?Sized,
    D: HandDetector + ?Sized,
{
    info!("place hand flat on the surface");
    let surface = capture_spacing(camera, detector, "surface", config.max_attempts)?;

    info!(
        settle_ms = config.settle_ms,
        hand_height_cm = config.hand_height_cm,
        "raise hand to calibration height"
    );
    std::thread::sleep(config.settle());

    let raised = capture_spacing(camera, detector, "raised", config.max_attempts)?;
    Ok(CalibrationSpacings { surface, raised })
}
