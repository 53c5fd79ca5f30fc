//! Fusion engine: hand landmarks + hazard contours → one proximity report

use contracts::{
    DepthModel, FusionConfig, HandObservation, HazardObservation, ProximityReport, TickSnapshot,
};
use tracing::trace;

use crate::geometry;

/// Nearest landmark/contour pair of one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestPair {
    pub polygon: usize,
    pub hand: usize,
    pub landmark: usize,
    /// Signed distance in hazard-frame pixels
    pub pixels: f64,
}

/// Stateless fusion over immutable calibration constants
#[derive(Debug, Clone)]
pub struct FusionEngine {
    config: FusionConfig,
    /// `None` when depth fusion is disabled
    depth: Option<DepthModel>,
}

impl FusionEngine {
    /// Engine with the uncalibrated depth model from `config.depth`
    pub fn new(config: FusionConfig) -> Self {
        let depth = config.depth.enabled.then(|| config.depth.default_model());
        Self { config, depth }
    }

    /// Engine with a depth model from the calibration routine
    pub fn with_depth_model(config: FusionConfig, model: DepthModel) -> Self {
        let depth = config.depth.enabled.then_some(model);
        Self { config, depth }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    pub fn depth_model(&self) -> Option<&DepthModel> {
        self.depth.as_ref()
    }

    /// Fuse the matched pair of one tick
    pub fn fuse_snapshot(&self, snapshot: &TickSnapshot) -> ProximityReport {
        self.fuse(&snapshot.hand.value, &snapshot.hazard.value)
    }

    pub fn fuse(&self, hand: &HandObservation, hazard: &HazardObservation) -> ProximityReport {
        let outer = self.config.outer_threshold_cm;
        let inner = self.config.inner_threshold_cm;

        if hand.count() == 0 || hazard.count() == 0 {
            return ProximityReport::clear(outer, inner);
        }

        let Some(nearest) = Self::nearest_pair(hand, hazard) else {
            return ProximityReport::clear(outer, inner);
        };

        let planar_cm = self.config.scale_factor * nearest.pixels;
        let distance_cm = match (self.depth.as_ref(), hand.depth_hint) {
            (Some(model), Some(spacing)) if spacing > 0.0 && spacing.is_finite() => {
                let depth_cm = model.height_cm(spacing);
                (planar_cm * planar_cm + depth_cm * depth_cm).sqrt()
                    - self.config.hazard_height_offset_cm
            }
            _ => planar_cm,
        };

        trace!(
            polygon = nearest.polygon,
            hand = nearest.hand,
            landmark = nearest.landmark,
            pixels = nearest.pixels,
            distance_cm,
            "fused"
        );
        ProximityReport::present(distance_cm, outer, inner)
    }

    /// Pair with the smallest signed distance (deepest penetration)
    ///
    /// 距离约定: 外正内负。OpenCV `pointPolygonTest` 是内正外负, 所以这里的
    /// 最小值就是它的最大值。
    /// Iterates polygons → hands → landmarks; the first minimum wins.
    /// Degenerate polygons and non-finite landmarks are skipped.
    pub fn nearest_pair(hand: &HandObservation, hazard: &HazardObservation) -> Option<NearestPair> {
        let mut best: Option<NearestPair> = None;

        for (polygon_idx, polygon) in hazard.contours.iter().enumerate() {
            if geometry::is_degenerate(polygon) {
                continue;
            }
            for (hand_idx, landmarks) in hand.hands.iter().enumerate() {
                for (landmark_idx, point) in landmarks.points().iter().enumerate() {
                    if !point.x.is_finite() || !point.y.is_finite() {
                        continue;
                    }
                    let Some(pixels) = geometry::signed_distance(polygon, point) else {
                        continue;
                    };
                    match best {
                        Some(current) if pixels >= current.pixels => {}
                        _ => {
                            best = Some(NearestPair {
                                polygon: polygon_idx,
                                hand: hand_idx,
                                landmark: landmark_idx,
                                pixels,
                            })
                        }
                    }
                }
            }
        }
        best
    }
}
