//! Signed point-to-polygon distance
//!
//! Negative inside, positive outside, zero on an edge.

use contracts::{Point, Polygon};
use nalgebra::{Point2, Vector2};

fn to_na(p: &Point) -> Point2<f64> {
    Point2::new(p.x, p.y)
}

/// Euclidean distance from `p` to segment `ab`
pub fn segment_distance(p: Point2<f64>, a: Point2<f64>, b: Point2<f64>) -> f64 {
    let ab: Vector2<f64> = b - a;
    let len_sq = ab.norm_squared();
    if len_sq == 0.0 {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    (p - (a + ab * t)).norm()
}

/// Crossing-number test; boundary points are not classified
pub fn contains(ring: &[Point], point: &Point) -> bool {
    let mut inside = false;
    let n = ring.len();
    for i in 0..n {
        let a = &ring[i];
        let b = &ring[(i + 1) % n];
        if (a.y > point.y) != (b.y > point.y) {
            let x_cross = (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x;
            if point.x < x_cross {
                inside = !inside;
            }
        }
    }
    inside
}

/// Polygon usable for distance queries: at least 3 vertices, non-zero area
pub fn is_degenerate(polygon: &Polygon) -> bool {
    polygon.open_ring().len() < 3 || polygon.area() == 0.0
}

/// Signed distance in pixels, `None` for degenerate polygons
pub fn signed_distance(polygon: &Polygon, point: &Point) -> Option<f64> {
    if is_degenerate(polygon) {
        return None;
    }
    let ring = polygon.open_ring();
    let p = to_na(point);

    let n = ring.len();
    let edge = (0..n)
        .map(|i| segment_distance(p, to_na(&ring[i]), to_na(&ring[(i + 1) % n])))
        .fold(f64::INFINITY, f64::min);

    if edge == 0.0 {
        return Some(0.0);
    }
    if contains(ring, point) {
        Some(-edge)
    } else {
        Some(edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(min: f64, max: f64) -> Polygon {
        Polygon::rectangle(Point::new(min, min), Point::new(max, max))
    }

    #[test]
    fn test_inside_outside_edge() {
        let sq = square(0.0, 4.0);
        assert_eq!(signed_distance(&sq, &Point::new(2.0, 1.0)), Some(-1.0));
        assert_eq!(signed_distance(&sq, &Point::new(7.0, 2.0)), Some(3.0));
        assert_eq!(signed_distance(&sq, &Point::new(4.0, 2.0)), Some(0.0));
        assert_eq!(signed_distance(&sq, &Point::new(0.0, 0.0)), Some(0.0));
    }

    #[test]
    fn test_corner_distance_is_euclidean() {
        let sq = square(0.0, 4.0);
        let d = signed_distance(&sq, &Point::new(7.0, 8.0)).unwrap();
        assert!((d - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_concave_polygon() {
        // U shape, the notch is outside
        let u = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(6.0, 0.0),
            Point::new(6.0, 6.0),
            Point::new(4.0, 6.0),
            Point::new(4.0, 2.0),
            Point::new(2.0, 2.0),
            Point::new(2.0, 6.0),
            Point::new(0.0, 6.0),
        ]);
        assert_eq!(signed_distance(&u, &Point::new(3.0, 5.0)), Some(1.0));
        assert_eq!(signed_distance(&u, &Point::new(1.0, 4.0)), Some(-1.0));
    }

    #[test]
    fn test_degenerate_polygons() {
        assert!(signed_distance(&Polygon::default(), &Point::new(0.0, 0.0)).is_none());
        let line = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(2.0, 2.0),
        ]);
        assert!(signed_distance(&line, &Point::new(0.0, 0.0)).is_none());
    }

    #[test]
    fn test_zero_length_segment() {
        let p = Point2::new(3.0, 4.0);
        let a = Point2::new(0.0, 0.0);
        assert_eq!(segment_distance(p, a, a), 5.0);
    }
}
