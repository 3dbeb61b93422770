//! End-to-end behaviour on small hand-built rasters.

#![allow(clippy::unwrap_used)]

use linework_pipeline::graph::NodeKind;
use linework_pipeline::{
    Dimensions, PipelineConfig, PipelineError, Pixel, Point, Raster, process, process_staged,
};

fn raster_with(dims: Dimensions, strokes: &[(Pixel, f32)]) -> Raster {
    Raster::from_fn(dims, |x, y| {
        strokes
            .iter()
            .find(|(p, _)| p.x == x && p.y == y)
            .map_or(0.0, |&(_, v)| v)
    })
}

fn ends(points: &[Point]) -> [Point; 2] {
    let mut ends = [points[0], points[points.len() - 1]];
    ends.sort_by(|a, b| a.x.total_cmp(&b.x));
    ends
}

#[test]
fn straight_line_becomes_one_two_point_polyline() {
    let raster = Raster::from_fn(Dimensions::new(10, 1), |_, _| 0.9);
    let drawing = process(&raster, &PipelineConfig::default()).unwrap();

    assert_eq!(drawing.len(), 1);
    let path = &drawing.paths[0];
    assert_eq!(ends(path.polyline.points()), [Point::new(0.0, 0.0), Point::new(9.0, 0.0)]);
    assert_eq!(path.polyline.len(), 2);
    assert!((path.confidence - 0.9).abs() < 1e-6);
    assert!(!path.closed);
}

#[test]
fn all_zero_raster_gives_empty_drawing() {
    let drawing = process(&Raster::zeros(Dimensions::new(32, 24)), &PipelineConfig::default()).unwrap();
    assert!(drawing.is_empty());
    assert_eq!(drawing.dimensions, Dimensions::new(32, 24));
}

#[test]
fn all_zero_raster_fails_in_strict_mode() {
    let config = PipelineConfig {
        strict: true,
        ..PipelineConfig::default()
    };
    assert!(matches!(
        process(&Raster::zeros(Dimensions::new(8, 8)), &config),
        Err(PipelineError::Serialization(_))
    ));
}

#[test]
fn plus_gives_one_junction_and_four_polylines() {
    let arms: Vec<(Pixel, f32)> = (0..11)
        .flat_map(|i| [(Pixel::new(i, 5), 0.9), (Pixel::new(5, i), 0.9)])
        .collect();
    let raster = raster_with(Dimensions::new(11, 11), &arms);
    let staged = process_staged(raster, None, &PipelineConfig::default()).unwrap();

    let graph = &staged.graph;
    assert_eq!(graph.count_kind(NodeKind::Junction), 1);
    assert_eq!(graph.count_kind(NodeKind::Endpoint), 4);
    assert_eq!(graph.edge_count(), 4);
    let junction = graph
        .nodes()
        .find(|(_, n)| n.kind == NodeKind::Junction)
        .map(|(_, n)| *n)
        .unwrap();
    assert_eq!(junction.pixel, Pixel::new(5, 5));
    assert_eq!(junction.degree, 4);

    assert_eq!(staged.extraction.merges, 0);
    assert_eq!(staged.drawing.len(), 4);
    let center = Point::new(5.0, 5.0);
    for path in &staged.drawing.paths {
        let points = path.polyline.points();
        assert!(points[0] == center || points[points.len() - 1] == center);
    }
}

#[test]
fn collinear_segments_through_a_touching_pixel_form_one_polyline() {
    // Two horizontal runs one row apart, joined by a single pixel.
    let mut pixels: Vec<(Pixel, f32)> = (1..=9).map(|x| (Pixel::new(x, 5), 0.9)).collect();
    pixels.push((Pixel::new(10, 5), 0.9));
    pixels.extend((11..=19).map(|x| (Pixel::new(x, 6), 0.9)));
    let raster = raster_with(Dimensions::new(21, 12), &pixels);

    let staged = process_staged(raster, None, &PipelineConfig::default()).unwrap();
    assert_eq!(staged.graph.count_kind(NodeKind::Junction), 0);
    assert_eq!(staged.drawing.len(), 1);
    let [a, b] = ends(staged.drawing.paths[0].polyline.points());
    assert_eq!(a, Point::new(1.0, 5.0));
    assert_eq!(b, Point::new(19.0, 6.0));
}

#[test]
fn faint_spur_joined_by_hysteresis_is_dropped_by_confidence() {
    // A strong bar with a faint spur hanging off it, and a faint speck
    // on its own.
    let mut pixels: Vec<(Pixel, f32)> = (1..=30).map(|x| (Pixel::new(x, 2), 0.9)).collect();
    pixels.extend((3..=8).map(|y| (Pixel::new(15, y), 0.3)));
    pixels.push((Pixel::new(26, 8), 0.3));
    let raster = raster_with(Dimensions::new(32, 10), &pixels);
    let config = PipelineConfig {
        hysteresis_low_threshold: Some(0.25),
        min_confidence: 0.4,
        ..PipelineConfig::default()
    };

    let staged = process_staged(raster, None, &config).unwrap();

    // The spur reaches the mask through the bar; the lone speck does not.
    assert!(staged.mask.contains(Pixel::new(15, 8)));
    assert!(!staged.mask.contains(Pixel::new(26, 8)));

    assert_eq!(staged.scoring.dropped_low_confidence, 1);
    assert_eq!(staged.drawing.len(), 1);
    let path = &staged.drawing.paths[0];
    assert!(path.confidence > 0.8);
    let [a, b] = ends(path.polyline.points());
    assert_eq!((a.x, b.x), (1.0, 30.0));
}

#[test]
fn faint_speck_is_excluded_by_plain_threshold() {
    let raster = raster_with(Dimensions::new(8, 8), &[(Pixel::new(4, 4), 0.3)]);
    let staged = process_staged(raster, None, &PipelineConfig::default()).unwrap();
    assert!(staged.mask.is_empty());
    assert!(staged.drawing.is_empty());
}

#[test]
fn thick_stroke_thins_to_its_centerline() {
    let raster = Raster::from_fn(Dimensions::new(30, 11), |x, y| {
        if (3..27).contains(&x) && (4..7).contains(&y) { 0.95 } else { 0.02 }
    });
    let staged = process_staged(raster, None, &PipelineConfig::default()).unwrap();
    assert_eq!(staged.drawing.len(), 1);
    assert!(staged.drawing.paths[0]
        .polyline
        .points()
        .iter()
        .all(|p| (p.y - 5.0).abs() < 1e-9));
}

#[test]
fn output_is_deterministic() {
    let raster = Raster::from_fn(Dimensions::new(24, 24), |x, y| {
        let (dx, dy) = (f64::from(x) - 12.0, f64::from(y) - 12.0);
        if (dx.hypot(dy) - 8.0).abs() < 1.0 { 0.9 } else { 0.0 }
    });
    let config = PipelineConfig::default();
    let first = process(&raster, &config).unwrap();
    let second = process(&raster, &config).unwrap();
    assert_eq!(first, second);
    assert!(!first.is_empty());
}
