//! Observation - Source output
//!
//! Typed per-tick detection results of the two sensors. Coordinates are in
//! pixel units of the thermal (hazard) frame so both sources share one plane.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Landmarks per detected hand (hand tracker topology)
pub const MAX_LANDMARKS: usize = 21;

/// Landmark index of the wrist
pub const WRIST_LANDMARK: usize = 0;

/// Landmark index of the index finger MCP knuckle
pub const INDEX_MCP_LANDMARK: usize = 5;

/// 2D point in hazard-frame pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Which producer slot an observation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    /// Visible-light hand tracker
    Visual,
    /// Thermal hazard detector
    Thermal,
}

impl SourceId {
    pub const ALL: [SourceId; 2] = [SourceId::Visual, SourceId::Thermal];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::Visual => "visual",
            SourceId::Thermal => "thermal",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Landmarks of one detected hand, at most [`MAX_LANDMARKS`] points
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HandLandmarks {
    points: Vec<Point>,
}

impl HandLandmarks {
    /// Build from points, truncating to [`MAX_LANDMARKS`]
    pub fn new(mut points: Vec<Point>) -> Self {
        points.truncate(MAX_LANDMARKS);
        Self { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Hand tracker observation for one tick
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HandObservation {
    /// Detected hands, in detector order
    pub hands: Vec<HandLandmarks>,

    /// Apparent wrist/knuckle spacing (normalized image units), depth proxy
    #[serde(default)]
    pub depth_hint: Option<f64>,
}

impl HandObservation {
    /// Observation with no hands ("no observation" sentinel)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build an observation keeping at most `max_hands` hands
    pub fn with_capacity_limit(
        mut hands: Vec<HandLandmarks>,
        max_hands: usize,
        depth_hint: Option<f64>,
    ) -> Self {
        hands.truncate(max_hands);
        Self { hands, depth_hint }
    }

    /// Number of detected hands
    pub fn count(&self) -> usize {
        self.hands.len()
    }

    /// Iterate all landmarks of all hands in order
    pub fn landmarks(&self) -> impl Iterator<Item = &Point> {
        self.hands.iter().flat_map(|h| h.points().iter())
    }
}

/// Hazard contour, implicitly closed
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polygon {
    points: Vec<Point>,
}

impl Polygon {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Axis-aligned rectangle from two opposite corners
    pub fn rectangle(min: Point, max: Point) -> Self {
        Self::new(vec![
            Point::new(min.x, min.y),
            Point::new(max.x, min.y),
            Point::new(max.x, max.y),
            Point::new(min.x, max.y),
        ])
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Vertices with an explicit closing point removed
    pub fn open_ring(&self) -> &[Point] {
        match self.points.as_slice() {
            [first, .., last] if first == last => &self.points[..self.points.len() - 1],
            points => points,
        }
    }

    /// Absolute shoelace area in px²
    pub fn area(&self) -> f64 {
        let ring = self.open_ring();
        if ring.len() < 3 {
            return 0.0;
        }
        let twice: f64 = ring
            .iter()
            .zip(ring.iter().cycle().skip(1))
            .map(|(a, b)| a.x * b.y - b.x * a.y)
            .sum();
        (twice / 2.0).abs()
    }
}

/// Thermal hazard observation for one tick
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HazardObservation {
    pub contours: Vec<Polygon>,
}

impl HazardObservation {
    /// Observation with no hazards ("no observation" sentinel)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build an observation keeping at most `max_hazards` contours
    pub fn with_capacity_limit(mut contours: Vec<Polygon>, max_hazards: usize) -> Self {
        contours.truncate(max_hazards);
        Self { contours }
    }

    /// Number of hazard contours
    pub fn count(&self) -> usize {
        self.contours.len()
    }
}

/// Output of one source for one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Observation {
    Hand(HandObservation),
    Hazard(HazardObservation),
}

impl Observation {
    /// Producer slot this observation is published into
    pub fn source_id(&self) -> SourceId {
        match self {
            Observation::Hand(_) => SourceId::Visual,
            Observation::Hazard(_) => SourceId::Thermal,
        }
    }

    /// Empty sentinel for the given source
    pub fn empty(source: SourceId) -> Self {
        match source {
            SourceId::Visual => Observation::Hand(HandObservation::empty()),
            SourceId::Thermal => Observation::Hazard(HazardObservation::empty()),
        }
    }

    /// Number of hands or hazards carried
    pub fn count(&self) -> usize {
        match self {
            Observation::Hand(hand) => hand.count(),
            Observation::Hazard(hazard) => hazard.count(),
        }
    }
}

impl From<HandObservation> for Observation {
    fn from(value: HandObservation) -> Self {
        Observation::Hand(value)
    }
}

impl From<HazardObservation> for Observation {
    fn from(value: HazardObservation) -> Self {
        Observation::Hazard(value)
    }
}

/// Value stamped with the tick it was published in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stamped<T> {
    pub tick: u64,
    pub value: T,
}

/// Matched observation pair of one tick, handed to the consumer
#[derive(Debug, Clone, PartialEq)]
pub struct TickSnapshot {
    /// Tick sequence number
    pub tick: u64,
    pub hand: Stamped<HandObservation>,
    pub hazard: Stamped<HazardObservation>,
}

impl TickSnapshot {
    /// Both observations come from this snapshot's tick
    pub fn is_matched(&self) -> bool {
        self.hand.tick == self.tick && self.hazard.tick == self.tick
    }
}
