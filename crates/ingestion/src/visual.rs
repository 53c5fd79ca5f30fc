//! Visible-light hand tracker source

use contracts::{
    DetectedHand, FrameCamera, HandDetector, HandLandmarks, HandObservation, NormalizedLandmark,
    Observation, Point, SensorFault, SourceId, VisualSourceConfig, INDEX_MCP_LANDMARK,
    WRIST_LANDMARK,
};
use tracing::{debug, trace};

use crate::ObservationSource;

/// Wrist to index-knuckle spacing in normalized image units
pub fn landmark_spacing(hand: &[NormalizedLandmark]) -> Option<f64> {
    let wrist = hand.get(WRIST_LANDMARK)?;
    let knuckle = hand.get(INDEX_MCP_LANDMARK)?;
    let spacing = (knuckle.x - wrist.x).hypot(knuckle.y - wrist.y);
    spacing.is_finite().then_some(spacing)
}

/// Hand tracker: camera frame → normalized landmarks → hazard-frame pixels
pub struct VisualHandSource<C: FrameCamera, D: HandDetector> {
    camera: C,
    detector: D,
    config: VisualSourceConfig,
}

impl<C: FrameCamera, D: HandDetector> VisualHandSource<C, D> {
    pub fn new(camera: C, detector: D, config: VisualSourceConfig) -> Self {
        debug!(
            max_hands = config.max_hands,
            frame_width = config.frame_width,
            frame_height = config.frame_height,
            "visual source created"
        );
        Self {
            camera,
            detector,
            config,
        }
    }

    pub fn config(&self) -> &VisualSourceConfig {
        &self.config
    }

    /// Camera and detector, for the calibration routine
    pub fn drivers_mut(&mut self) -> (&mut C, &mut D) {
        (&mut self.camera, &mut self.detector)
    }

    /// Project a normalized landmark into hazard-frame pixels
    pub fn project(&self, landmark: &NormalizedLandmark) -> Point {
        Point::new(
            (f64::from(self.config.frame_width) * landmark.x).floor(),
            (f64::from(self.config.frame_height) * landmark.y).floor(),
        )
    }

    fn build_observation(&self, detected: Vec<DetectedHand>) -> HandObservation {
        let depth_hint = detected.first().and_then(|hand| landmark_spacing(hand));
        let hands = detected
            .iter()
            .take(self.config.max_hands)
            .map(|hand| HandLandmarks::new(hand.iter().map(|lm| self.project(lm)).collect()))
            .collect();
        HandObservation::with_capacity_limit(hands, self.config.max_hands, depth_hint)
    }
}

impl<C: FrameCamera, D: HandDetector> ObservationSource for VisualHandSource<C, D> {
    fn source_id(&self) -> SourceId {
        SourceId::Visual
    }

    fn observe(&mut self) -> Result<Observation, SensorFault> {
        let image = self.camera.capture_frame()?;
        let detected = self
            .detector
            .detect_hand_landmarks(&image, self.config.max_hands)?;
        let observation = self.build_observation(detected);
        trace!(
            sequence = image.sequence,
            hands = observation.count(),
            depth_hint = ?observation.depth_hint,
            "hand observation"
        );
        Ok(observation.into())
    }
}

impl<C: FrameCamera, D: HandDetector> Drop for VisualHandSource<C, D> {
    fn drop(&mut self) {
        self.camera.stop();
        debug!("visual source stopped");
    }
}
