//! Simulated drivers
//!
//! Let the whole pipeline run without camera hardware: a camera that only
//! paces frames, a hand detector walking a waypoint path, and a thermal
//! camera rendering hot rectangles over an ambient background.

use std::time::Duration;

use bytes::Bytes;
use contracts::{
    DetectedHand, FrameCamera, FrameHeader, HandDetector, Image, NormalizedLandmark, SensorFault,
    SimulatedHazard, SimulationConfig, SourceId, ThermalCamera, ThermalFrame, MAX_LANDMARKS,
};

/// Frame-pacing camera; images carry no pixels
#[derive(Debug)]
pub struct SimulatedCamera {
    interval: Duration,
    sequence: u64,
    stopped: bool,
}

impl SimulatedCamera {
    pub const WIDTH: u32 = 640;
    pub const HEIGHT: u32 = 480;

    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            sequence: 0,
            stopped: false,
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

impl FrameCamera for SimulatedCamera {
    fn capture_frame(&mut self) -> Result<Image, SensorFault> {
        if self.stopped {
            return Err(SensorFault::disconnected(SourceId::Visual, "camera stopped"));
        }
        if !self.interval.is_zero() {
            std::thread::sleep(self.interval);
        }
        self.sequence += 1;
        Ok(Image {
            width: Self::WIDTH,
            height: Self::HEIGHT,
            sequence: self.sequence,
            data: Bytes::new(),
        })
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}

/// Hand whose wrist walks a closed waypoint loop, one step per frame
#[derive(Debug, Clone)]
pub struct SimulatedHandDetector {
    path: Vec<[f64; 2]>,
    steps_per_segment: u64,
    step: u64,
    spacing: f64,
}

impl SimulatedHandDetector {
    pub fn new(path: Vec<[f64; 2]>, steps_per_segment: u32, spacing: f64) -> Self {
        Self {
            path,
            steps_per_segment: u64::from(steps_per_segment.max(1)),
            step: 0,
            spacing,
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(
            config.hand_path.clone(),
            config.steps_per_segment,
            config.hand_spacing,
        )
    }

    /// Wrist position after `step` frames
    pub fn wrist_at(&self, step: u64) -> Option<NormalizedLandmark> {
        match self.path.as_slice() {
            [] => None,
            [only] => Some(NormalizedLandmark::new(only[0], only[1])),
            path => {
                let total = path.len() as u64 * self.steps_per_segment;
                let s = step % total;
                let segment = (s / self.steps_per_segment) as usize;
                let t = (s % self.steps_per_segment) as f64 / self.steps_per_segment as f64;
                let a = path[segment];
                let b = path[(segment + 1) % path.len()];
                Some(NormalizedLandmark::new(
                    a[0] + (b[0] - a[0]) * t,
                    a[1] + (b[1] - a[1]) * t,
                ))
            }
        }
    }

    /// 21 landmarks fanned out above the wrist, four joints per finger
    pub fn hand_at(&self, wrist: NormalizedLandmark) -> DetectedHand {
        let mut hand = Vec::with_capacity(MAX_LANDMARKS);
        hand.push(wrist);
        for i in 1..MAX_LANDMARKS {
            let finger = ((i - 1) / 4) as f64;
            let joint = ((i - 1) % 4 + 1) as f64;
            let angle = (-150.0 + finger * 30.0_f64).to_radians();
            let reach = self.spacing * joint;
            // may leave 0..=1 near the image border, like a real detector
            hand.push(NormalizedLandmark::new(
                wrist.x + angle.cos() * reach,
                wrist.y + angle.sin() * reach,
            ));
        }
        hand
    }
}

impl HandDetector for SimulatedHandDetector {
    fn detect_hand_landmarks(
        &mut self,
        _image: &Image,
        max_hands: usize,
    ) -> Result<Vec<DetectedHand>, SensorFault> {
        let wrist = self.wrist_at(self.step);
        self.step += 1;
        Ok(wrist
            .filter(|_| max_hands > 0)
            .map(|w| self.hand_at(w))
            .into_iter()
            .collect())
    }
}

/// Thermal array with fixed hot rectangles over an ambient background
#[derive(Debug)]
pub struct SimulatedThermalCamera {
    width: usize,
    height: usize,
    ambient_c: f32,
    hazards: Vec<SimulatedHazard>,
    interval: Duration,
    frame_counter: u64,
    stopped: bool,
}

impl SimulatedThermalCamera {
    pub fn new(
        width: usize,
        height: usize,
        ambient_c: f32,
        hazards: Vec<SimulatedHazard>,
        interval: Duration,
    ) -> Self {
        Self {
            width,
            height,
            ambient_c,
            hazards,
            interval,
            frame_counter: 0,
            stopped: false,
        }
    }

    pub fn from_config(config: &SimulationConfig, width: usize, height: usize) -> Self {
        Self::new(
            width,
            height,
            config.ambient_c,
            config.hazards.clone(),
            config.frame_interval(),
        )
    }

    fn render(&self) -> Vec<f32> {
        let mut temperatures = vec![self.ambient_c; self.width * self.height];
        for hazard in &self.hazards {
            let x1 = hazard.max[0].min(self.width.saturating_sub(1));
            let y1 = hazard.max[1].min(self.height.saturating_sub(1));
            for y in hazard.min[1]..=y1 {
                for x in hazard.min[0]..=x1 {
                    temperatures[y * self.width + x] = hazard.temperature_c;
                }
            }
        }
        temperatures
    }
}

impl ThermalCamera for SimulatedThermalCamera {
    fn read_frame(&mut self) -> Result<ThermalFrame, SensorFault> {
        if self.stopped {
            return Err(SensorFault::disconnected(SourceId::Thermal, "camera stopped"));
        }
        if !self.interval.is_zero() {
            std::thread::sleep(self.interval);
        }
        self.frame_counter += 1;
        Ok(ThermalFrame {
            header: FrameHeader {
                frame_counter: self.frame_counter,
                timestamp_ms: self.frame_counter * self.interval.as_millis() as u64,
            },
            width: self.width,
            height: self.height,
            temperatures: self.render(),
        })
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}
