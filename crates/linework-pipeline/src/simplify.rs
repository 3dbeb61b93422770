//! Polyline simplification with Ramer-Douglas-Peucker.
//!
//! Distances are measured to the *segment* between the current pair of
//! kept points, not to its infinite line, so every dropped vertex ends up
//! within `tolerance` of the simplified polyline itself. This matters for
//! closed chains, whose two endpoints coincide.
//!
//! The recursion is unrolled onto an explicit stack: skeleton chains can
//! run to thousands of pixels and a straight-ish chain drives plain
//! recursion to linear depth.

use crate::types::{Point, Polyline};

/// Simplify a polyline. Endpoints are always kept; a tolerance of `0.0`
/// drops only exactly collinear vertices.
#[must_use = "returns the simplified polyline"]
pub fn simplify(polyline: &Polyline, tolerance: f64) -> Polyline {
    Polyline::new(simplify_points(polyline.points(), tolerance))
}

/// Simplify a run of points, returning the kept subsequence.
#[must_use = "returns the simplified points"]
pub fn simplify_points(points: &[Point], tolerance: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let last = points.len() - 1;
    let mut kept = vec![false; points.len()];
    kept[0] = true;
    kept[last] = true;

    let mut spans = vec![(0, last)];
    while let Some((start, end)) = spans.pop() {
        if end <= start + 1 {
            continue;
        }
        let mut max_dist = 0.0;
        let mut max_idx = start;
        for (i, &p) in points.iter().enumerate().take(end).skip(start + 1) {
            let d = segment_distance(p, points[start], points[end]);
            if d > max_dist {
                max_dist = d;
                max_idx = i;
            }
        }
        if max_dist > tolerance {
            kept[max_idx] = true;
            spans.push((max_idx, end));
            spans.push((start, max_idx));
        }
    }

    points
        .iter()
        .zip(&kept)
        .filter(|&(_, &k)| k)
        .map(|(&p, _)| p)
        .collect()
}

/// Distance from `p` to the closed segment `a`-`b`.
///
/// Falls back to the distance to `a` when the segment has zero length.
pub(crate) fn segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx.mul_add(dx, dy * dy);
    if length_sq == 0.0 {
        return p.distance(a);
    }
    let t = (p.x - a.x).mul_add(dx, (p.y - a.y) * dy) / length_sq;
    let t = t.clamp(0.0, 1.0);
    p.distance(Point::new(t.mul_add(dx, a.x), t.mul_add(dy, a.y)))
}

/// Largest distance from any point of `original` to the polyline
/// `simplified`.
#[must_use]
pub fn max_deviation(original: &[Point], simplified: &[Point]) -> f64 {
    original
        .iter()
        .map(|&p| match simplified {
            [] => f64::INFINITY,
            [only] => p.distance(*only),
            _ => simplified
                .windows(2)
                .map(|w| segment_distance(p, w[0], w[1]))
                .fold(f64::INFINITY, f64::min),
        })
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(coords: &[(f64, f64)]) -> Vec<Point> {
        coords.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    #[test]
    fn short_inputs_are_returned_as_is() {
        assert!(simplify_points(&[], 1.0).is_empty());
        let two = pts(&[(0.0, 0.0), (5.0, 1.0)]);
        assert_eq!(simplify_points(&two, 1.0), two);
    }

    #[test]
    fn straight_run_collapses_to_endpoints() {
        let line: Vec<Point> = (0..10).map(|x| Point::new(f64::from(x), 0.0)).collect();
        let result = simplify_points(&line, 1.0);
        assert_eq!(result, pts(&[(0.0, 0.0), (9.0, 0.0)]));
    }

    #[test]
    fn zero_tolerance_keeps_every_bend() {
        let bent = pts(&[(0.0, 0.0), (1.0, 0.1), (2.0, 0.0), (3.0, 0.05), (4.0, 0.0)]);
        assert_eq!(simplify_points(&bent, 0.0).len(), 5);
    }

    #[test]
    fn zigzag_peaks_depend_on_tolerance() {
        let zigzag = Polyline::new(pts(&[
            (0.0, 0.0),
            (2.0, 5.0),
            (4.0, 0.0),
            (6.0, 5.0),
            (8.0, 0.0),
        ]));
        assert_eq!(simplify(&zigzag, 1.0).len(), 5);
        assert_eq!(simplify(&zigzag, 10.0).len(), 2);
    }

    #[test]
    fn closed_chain_keeps_its_far_side() {
        // A square ring whose endpoints coincide.
        let ring = pts(&[
            (0.0, 0.0),
            (4.0, 0.0),
            (4.0, 4.0),
            (0.0, 4.0),
            (0.0, 0.0),
        ]);
        let result = simplify_points(&ring, 1.0);
        assert_eq!(result, ring);
    }

    #[test]
    fn dropped_points_stay_within_tolerance() {
        let wobble: Vec<Point> = (0..50)
            .map(|i| {
                let x = f64::from(i);
                Point::new(x, (x * 0.7).sin() * 1.5)
            })
            .collect();
        for tolerance in [0.25, 0.5, 1.0, 2.0] {
            let result = simplify_points(&wobble, tolerance);
            assert_eq!(result.first(), wobble.first());
            assert_eq!(result.last(), wobble.last());
            assert!(max_deviation(&wobble, &result) <= tolerance + 1e-9);
        }
    }

    #[test]
    fn long_zigzag_keeps_every_vertex() {
        let chain: Vec<Point> = (0..5_000)
            .map(|i| Point::new(f64::from(i), f64::from(i % 2)))
            .collect();
        let result = simplify_points(&chain, 0.0);
        assert_eq!(result.len(), chain.len());
    }

    #[test]
    fn segment_distance_clamps_to_endpoints() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(2.0, 0.0);
        assert!((segment_distance(Point::new(1.0, 3.0), a, b) - 3.0).abs() < 1e-12);
        assert!((segment_distance(Point::new(5.0, 4.0), a, b) - 5.0).abs() < 1e-12);
        assert!((segment_distance(Point::new(3.0, 4.0), a, a) - 5.0).abs() < 1e-12);
    }
}
