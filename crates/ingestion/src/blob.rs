//! Threshold blob detector
//!
//! Reference `HazardDetector`: every 4-connected region hotter than the
//! threshold becomes its bounding rectangle (pixel centers as vertices).

use contracts::{HazardDetector, Point, Polygon, SensorFault, ThermalFrame};

#[derive(Debug, Default, Clone)]
pub struct BlobHazardDetector {
    visited: Vec<bool>,
    stack: Vec<usize>,
}

impl BlobHazardDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounding boxes `(x0, y0, x1, y1)` of hot regions, row-major discovery order
    pub fn hot_regions(&mut self, frame: &ThermalFrame, threshold_c: f32) -> Vec<[usize; 4]> {
        let (w, h) = (frame.width, frame.height);
        let n = (w * h).min(frame.temperatures.len());
        self.visited.clear();
        self.visited.resize(n, false);

        let hot = |idx: usize| frame.temperatures[idx] > threshold_c;
        let mut regions = Vec::new();

        for start in 0..n {
            if self.visited[start] || !hot(start) {
                continue;
            }
            self.visited[start] = true;
            self.stack.push(start);
            let mut bbox = [start % w, start / w, start % w, start / w];

            while let Some(idx) = self.stack.pop() {
                let (x, y) = (idx % w, idx / w);
                bbox[0] = bbox[0].min(x);
                bbox[1] = bbox[1].min(y);
                bbox[2] = bbox[2].max(x);
                bbox[3] = bbox[3].max(y);

                let mut visit = |next: usize| {
                    if next < n && !self.visited[next] && hot(next) {
                        self.visited[next] = true;
                        self.stack.push(next);
                    }
                };
                if x > 0 {
                    visit(idx - 1);
                }
                if x + 1 < w {
                    visit(idx + 1);
                }
                if y > 0 {
                    visit(idx - w);
                }
                if y + 1 < h {
                    visit(idx + w);
                }
            }
            regions.push(bbox);
        }
        regions
    }
}

impl HazardDetector for BlobHazardDetector {
    fn detect_hazard_contours(
        &mut self,
        frame: &ThermalFrame,
        threshold_c: f32,
    ) -> Result<Vec<Polygon>, SensorFault> {
        Ok(self
            .hot_regions(frame, threshold_c)
            .into_iter()
            .map(|[x0, y0, x1, y1]| {
                Polygon::rectangle(
                    Point::new(x0 as f64, y0 as f64),
                    Point::new(x1 as f64, y1 as f64),
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::FrameHeader;

    fn frame_with(width: usize, height: usize, hot: &[(usize, usize)]) -> ThermalFrame {
        let mut temperatures = vec![22.0; width * height];
        for &(x, y) in hot {
            temperatures[y * width + x] = 60.0;
        }
        ThermalFrame {
            header: FrameHeader::default(),
            width,
            height,
            temperatures,
        }
    }

    #[test]
    fn test_two_separate_blobs() {
        let mut hot = Vec::new();
        for y in 1..4 {
            for x in 1..4 {
                hot.push((x, y));
            }
        }
        hot.extend([(7, 5), (8, 5), (8, 6)]);
        let frame = frame_with(10, 8, &hot);

        let regions = BlobHazardDetector::new().hot_regions(&frame, 40.0);
        assert_eq!(regions, vec![[1, 1, 3, 3], [7, 5, 8, 6]]);
    }

    #[test]
    fn test_diagonal_pixels_are_not_connected() {
        let frame = frame_with(4, 4, &[(0, 0), (1, 1)]);
        let regions = BlobHazardDetector::new().hot_regions(&frame, 40.0);
        assert_eq!(regions.len(), 2);
    }

    #[test]
    fn test_threshold_is_strict() {
        let frame = frame_with(3, 3, &[(1, 1)]);
        assert!(BlobHazardDetector::new().hot_regions(&frame, 60.0).is_empty());
    }

    #[test]
    fn test_contours_are_rectangles() {
        let frame = frame_with(6, 6, &[(1, 1), (2, 1), (3, 1), (1, 2), (2, 2), (3, 2)]);
        let contours = BlobHazardDetector::new()
            .detect_hazard_contours(&frame, 40.0)
            .unwrap();
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].area(), 2.0);
    }
}
