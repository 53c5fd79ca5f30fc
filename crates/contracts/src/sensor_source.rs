//! Sensor collaborator traits
//!
//! Interfaces of the external drivers and detectors the sources wrap. Real
//! camera, hand-keypoint and thermal-array implementations live outside
//! this workspace; simulated ones live in `ingestion::sim`.
//!
//! All calls may block on hardware I/O and are only ever made from the
//! owning source's capture thread.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{Polygon, SensorFault};

/// Captured visible-light frame (opaque to the core)
#[derive(Debug, Clone)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    /// Driver frame counter
    pub sequence: u64,
    /// Pixel payload (BGR888 on the reference camera)
    pub data: Bytes,
}

/// Landmark in normalized image coordinates (`0.0..=1.0`)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalizedLandmark {
    pub x: f64,
    pub y: f64,
}

impl NormalizedLandmark {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One detected hand, landmarks in detector order
pub type DetectedHand = Vec<NormalizedLandmark>;

/// Thermal frame header
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameHeader {
    /// Driver frame counter
    pub frame_counter: u64,
    /// Sensor timestamp in milliseconds
    pub timestamp_ms: u64,
}

/// Decoded thermal array, row-major, degrees Celsius
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalFrame {
    pub header: FrameHeader,
    pub width: usize,
    pub height: usize,
    pub temperatures: Vec<f32>,
}

impl ThermalFrame {
    /// Temperature at (x, y); `None` outside the array
    pub fn at(&self, x: usize, y: usize) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.temperatures.get(y * self.width + x).copied()
    }

    /// Array dimensions match the payload length
    pub fn is_consistent(&self) -> bool {
        self.temperatures.len() == self.width * self.height
    }

    pub fn min_max(&self) -> Option<(f32, f32)> {
        self.temperatures.iter().fold(None, |acc, &t| match acc {
            None => Some((t, t)),
            Some((lo, hi)) => Some((lo.min(t), hi.max(t))),
        })
    }
}

/// Visible-light camera driver
pub trait FrameCamera: Send {
    /// Capture the next frame (blocking)
    fn capture_frame(&mut self) -> Result<Image, SensorFault>;

    /// Release the device
    fn stop(&mut self);
}

/// Hand keypoint detector
pub trait HandDetector: Send {
    /// Detect hands in a frame, at most `max_hands`
    fn detect_hand_landmarks(
        &mut self,
        image: &Image,
        max_hands: usize,
    ) -> Result<Vec<DetectedHand>, SensorFault>;
}

/// Thermal array driver
pub trait ThermalCamera: Send {
    /// Read the next decoded frame (blocking)
    fn read_frame(&mut self) -> Result<ThermalFrame, SensorFault>;

    /// Release the device
    fn stop(&mut self);
}

/// Hazard contour detector over a thermal frame
pub trait HazardDetector: Send {
    /// Contours of regions hotter than `threshold_c`
    fn detect_hazard_contours(
        &mut self,
        frame: &ThermalFrame,
        threshold_c: f32,
    ) -> Result<Vec<Polygon>, SensorFault>;
}

impl<T: FrameCamera + ?Sized> FrameCamera for Box<T> {
    fn capture_frame(&mut self) -> Result<Image, SensorFault> {
        (**self).capture_frame()
    }

    fn stop(&mut self) {
        (**self).stop()
    }
}

impl<T: HandDetector + ?Sized> HandDetector for Box<T> {
    fn detect_hand_landmarks(
        &mut self,
        image: &Image,
        max_hands: usize,
    ) -> Result<Vec<DetectedHand>, SensorFault> {
        (**self).detect_hand_landmarks(image, max_hands)
    }
}

impl<T: ThermalCamera + ?Sized> ThermalCamera for Box<T> {
    fn read_frame(&mut self) -> Result<ThermalFrame, SensorFault> {
        (**self).read_frame()
    }

    fn stop(&mut self) {
        (**self).stop()
    }
}

impl<T: HazardDetector + ?Sized> HazardDetector for Box<T> {
    fn detect_hazard_contours(
        &mut self,
        frame: &ThermalFrame,
        threshold_c: f32,
    ) -> Result<Vec<Polygon>, SensorFault> {
        (**self).detect_hazard_contours(frame, threshold_c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thermal_frame_access() {
        let frame = ThermalFrame {
            header: FrameHeader::default(),
            width: 2,
            height: 2,
            temperatures: vec![20.0, 21.0, 45.0, 22.0],
        };
        assert!(frame.is_consistent());
        assert_eq!(frame.at(0, 1), Some(45.0));
        assert_eq!(frame.at(2, 0), None);
        assert_eq!(frame.min_max(), Some((20.0, 45.0)));
    }
}
