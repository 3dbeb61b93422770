//! SVG export and import.
//!
//! [`to_svg`] writes a [`VectorDrawing`] as an SVG document using the
//! [`svg`] crate for document construction, XML escaping, and path data
//! formatting. The `viewBox` is the raster's pixel grid, so path
//! coordinates are raster pixel coordinates with no scaling. Each path is
//! stroke-only and carries its confidence as a `data-confidence`
//! attribute.
//!
//! [`read_svg_paths`] parses the polylines back out of such a document
//! (or any SVG whose paths use only straight-line commands).
//!
//! Both are pure functions with no I/O.

use svg::Document;
use svg::node::element::path::{Command, Data, Position};
use svg::node::element::{Description, Element, Path, Title, tag};
use svg::node::{Node, Text, Value};
use svg::parser::Event;

use linework_pipeline::{Point, VectorDrawing, VectorPath};

use crate::error::ExportError;

/// Metadata to embed in the SVG document.
///
/// All fields are optional. When present, a `<title>`, `<desc>` and/or
/// `<metadata>` element is emitted immediately after the opening `<svg>`
/// tag. Text values are XML-escaped automatically by the `svg` crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, emitted as `<title>`.
    ///
    /// Typically the source raster's filename without extension.
    pub title: Option<&'a str>,

    /// Document description, emitted as `<desc>`.
    pub description: Option<&'a str>,

    /// Serialized [`PipelineConfig`](linework_pipeline::PipelineConfig)
    /// JSON, emitted inside `<metadata>` wrapped in a namespaced
    /// `<linework:pipeline>` element so exported files carry the exact
    /// settings that produced them.
    pub config_json: Option<&'a str>,
}

/// A polyline read back from an SVG `<path>`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPath {
    /// Absolute coordinates. A closed subpath repeats its first point at
    /// the end.
    pub points: Vec<Point>,
    /// Whether the subpath ended with a close command.
    pub closed: bool,
    /// The path's `data-confidence` attribute, if present and numeric.
    pub confidence: Option<f32>,
}

/// Build an SVG path `d` attribute string for one output path.
///
/// Open paths use `M` then `L` commands. A closed path drops its
/// repeated last point and ends with `z`. A single-point path becomes a
/// zero-length segment so round line caps still render it as a dot.
/// Returns an empty string for a path with no points.
///
/// # Examples
///
/// ```
/// use linework_pipeline::{Point, Polyline, VectorPath};
/// use linework_export::build_path_data;
///
/// let path = VectorPath {
///     polyline: Polyline::new(vec![Point::new(10.0, 20.0), Point::new(30.0, 40.0)]),
///     confidence: 0.9,
///     closed: false,
///     source_edges: vec![0],
/// };
/// assert_eq!(build_path_data(&path), "M10,20 L30,40");
/// ```
#[must_use]
pub fn build_path_data(path: &VectorPath) -> String {
    let points = path.polyline.points();
    let Some(first) = points.first() else {
        return String::new();
    };

    let mut data = Data::new().move_to((first.x, first.y));
    match points {
        [_] => data = data.line_to((first.x, first.y)),
        [_, rest @ ..] if path.closed => {
            // The last point repeats the first; `z` draws that segment.
            for p in &rest[..rest.len() - 1] {
                data = data.line_to((p.x, p.y));
            }
            data = data.close();
        }
        [_, rest @ ..] => {
            for p in rest {
                data = data.line_to((p.x, p.y));
            }
        }
        [] => {}
    }
    String::from(Value::from(data))
}

/// Serialize a drawing into an SVG document string.
///
/// Paths keep the drawing's order. The root `<svg>` element records the
/// binarization threshold (and hysteresis low threshold, when used) as
/// `data-threshold` / `data-hysteresis-low` attributes.
///
/// # Examples
///
/// ```
/// use linework_pipeline::{Dimensions, PipelineConfig, VectorDrawing};
/// use linework_export::{SvgMetadata, to_svg};
///
/// let drawing = VectorDrawing::empty(Dimensions::new(800, 600), &PipelineConfig::default());
/// let metadata = SvgMetadata {
///     title: Some("sketch-01"),
///     ..SvgMetadata::default()
/// };
/// let svg = to_svg(&drawing, &metadata);
/// assert!(svg.contains("<title>sketch-01</title>"));
/// assert!(svg.contains(r#"viewBox="0 0 800 600""#));
/// ```
#[must_use]
pub fn to_svg(drawing: &VectorDrawing, metadata: &SvgMetadata<'_>) -> String {
    let w = drawing.dimensions.width;
    let h = drawing.dimensions.height;
    let mut doc = Document::new()
        .set("width", w)
        .set("height", h)
        .set("viewBox", (0, 0, w, h))
        .set("data-threshold", drawing.threshold);
    if let Some(low) = drawing.hysteresis_low_threshold {
        doc = doc.set("data-hysteresis-low", low);
    }

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }

    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }

    if let Some(config_json) = metadata.config_json {
        let mut pipeline_el = Element::new("linework:pipeline");
        pipeline_el.assign("xmlns:linework", "urn:linework:pipeline");
        pipeline_el.append(Text::new(config_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(pipeline_el);
        doc = doc.add(metadata_el);
    }

    for path in &drawing.paths {
        let d = build_path_data(path);
        if d.is_empty() {
            continue;
        }
        let element = Path::new()
            .set("d", d)
            .set("fill", "none")
            .set("stroke", "black")
            .set("stroke-width", 1)
            .set("stroke-linecap", "round")
            .set("stroke-linejoin", "round")
            .set("data-confidence", format!("{:.4}", path.confidence));
        doc = doc.add(element);
    }

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}

/// Parse every `<path>` in `content` into polylines.
///
/// Each subpath becomes its own [`ParsedPath`]. Move, line, horizontal,
/// vertical and close commands are supported in both absolute and
/// relative form. A zero-length segment written for a dot reads back as
/// a single point.
///
/// # Errors
///
/// Returns [`ExportError::SvgParse`] if the document is malformed, a
/// `d` attribute cannot be parsed, or a path uses curve or arc commands.
pub fn read_svg_paths(content: &str) -> Result<Vec<ParsedPath>, ExportError> {
    let parser = svg::read(content).map_err(|e| ExportError::SvgParse(e.to_string()))?;
    let mut paths = Vec::new();
    for event in parser {
        match event {
            Event::Error(e) => return Err(ExportError::SvgParse(e.to_string())),
            Event::Tag(tag::Path, _, attributes) => {
                let Some(d) = attributes.get("d") else {
                    continue;
                };
                let data = Data::parse(d).map_err(|e| ExportError::SvgParse(e.to_string()))?;
                let confidence = attributes
                    .get("data-confidence")
                    .and_then(|v| v.parse::<f32>().ok());
                paths.extend(subpaths(&data, confidence)?);
            }
            _ => {}
        }
    }
    Ok(paths)
}

/// Split path data into subpaths of absolute points.
fn subpaths(data: &Data, confidence: Option<f32>) -> Result<Vec<ParsedPath>, ExportError> {
    let mut out = Vec::new();
    let mut current: Vec<Point> = Vec::new();
    let mut pen = Point::new(0.0, 0.0);

    let mut finish = |points: &mut Vec<Point>, closed: bool| {
        if points.is_empty() {
            return;
        }
        let mut points = std::mem::take(points);
        if closed {
            points.push(points[0]);
        } else if points.len() == 2 && points[0] == points[1] {
            points.truncate(1);
        }
        out.push(ParsedPath {
            points,
            closed,
            confidence,
        });
    };

    for command in data.iter() {
        match command {
            Command::Move(position, params) => {
                finish(&mut current, false);
                // Pairs after the first are implicit line-tos.
                for pair in params.chunks_exact(2) {
                    pen = step(pen, *position, f64::from(pair[0]), f64::from(pair[1]));
                    current.push(pen);
                }
            }
            Command::Line(position, params) => {
                for pair in params.chunks_exact(2) {
                    pen = step(pen, *position, f64::from(pair[0]), f64::from(pair[1]));
                    current.push(pen);
                }
            }
            Command::HorizontalLine(position, params) => {
                for &x in params.iter() {
                    pen = match position {
                        Position::Absolute => Point::new(f64::from(x), pen.y),
                        Position::Relative => Point::new(pen.x + f64::from(x), pen.y),
                    };
                    current.push(pen);
                }
            }
            Command::VerticalLine(position, params) => {
                for &y in params.iter() {
                    pen = match position {
                        Position::Absolute => Point::new(pen.x, f64::from(y)),
                        Position::Relative => Point::new(pen.x, pen.y + f64::from(y)),
                    };
                    current.push(pen);
                }
            }
            Command::Close => {
                if let Some(&start) = current.first() {
                    pen = start;
                }
                finish(&mut current, true);
            }
            other => {
                return Err(ExportError::SvgParse(format!(
                    "unsupported path command {other:?}; only straight segments can be read"
                )));
            }
        }
    }
    finish(&mut current, false);
    Ok(out)
}

fn step(pen: Point, position: Position, x: f64, y: f64) -> Point {
    match position {
        Position::Absolute => Point::new(x, y),
        Position::Relative => Point::new(pen.x + x, pen.y + y),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use linework_pipeline::{Dimensions, PipelineConfig, Polyline};

    fn path(coords: &[(f64, f64)], closed: bool, confidence: f32) -> VectorPath {
        VectorPath {
            polyline: Polyline::new(coords.iter().map(|&(x, y)| Point::new(x, y)).collect()),
            confidence,
            closed,
            source_edges: vec![0],
        }
    }

    fn drawing(paths: Vec<VectorPath>) -> VectorDrawing {
        let mut drawing = VectorDrawing::empty(Dimensions::new(64, 48), &PipelineConfig::default());
        drawing.paths = paths;
        drawing
    }

    fn no_meta() -> SvgMetadata<'static> {
        SvgMetadata::default()
    }

    // --- build_path_data ---

    #[test]
    fn build_path_data_empty() {
        assert_eq!(build_path_data(&path(&[], false, 1.0)), "");
    }

    #[test]
    fn build_path_data_open() {
        let d = build_path_data(&path(&[(10.0, 15.0), (12.5, 18.5), (14.0, 20.0)], false, 1.0));
        assert_eq!(d, "M10,15 L12.5,18.5 L14,20");
    }

    #[test]
    fn build_path_data_closed_drops_repeated_point() {
        let square = [(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0), (0.0, 0.0)];
        let d = build_path_data(&path(&square, true, 1.0));
        assert_eq!(d, "M0,0 L4,0 L4,4 L0,4 z");
    }

    #[test]
    fn build_path_data_dot() {
        assert_eq!(build_path_data(&path(&[(3.0, 7.0)], false, 1.0)), "M3,7 L3,7");
    }

    // --- to_svg ---

    #[test]
    fn empty_drawing_is_valid_svg() {
        let svg = to_svg(&drawing(vec![]), &no_meta());
        assert!(svg.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(svg.contains(r#"width="64""#));
        assert!(svg.contains(r#"height="48""#));
        assert!(svg.contains(r#"viewBox="0 0 64 48""#));
        assert!(svg.contains(r#"data-threshold="0.5""#));
        assert!(!svg.contains("data-hysteresis-low"));
        assert!(!svg.contains("<path"));
    }

    #[test]
    fn each_path_is_stroke_only_with_confidence() {
        let svg = to_svg(
            &drawing(vec![
                path(&[(1.0, 2.0), (3.0, 4.0)], false, 0.9),
                path(&[(5.0, 6.0), (7.0, 8.0)], false, 0.25),
            ]),
            &no_meta(),
        );
        assert_eq!(svg.matches("<path").count(), 2);
        assert_eq!(svg.matches(r#"fill="none""#).count(), 2);
        assert!(svg.contains(r#"d="M1,2 L3,4""#));
        assert!(svg.contains(r#"data-confidence="0.9000""#));
        assert!(svg.contains(r#"data-confidence="0.2500""#));
        // Order is preserved.
        assert!(svg.find("M1,2").unwrap() < svg.find("M5,6").unwrap());
    }

    #[test]
    fn hysteresis_threshold_is_recorded() {
        let config = PipelineConfig {
            hysteresis_low_threshold: Some(0.25),
            ..PipelineConfig::default()
        };
        let svg = to_svg(&VectorDrawing::empty(Dimensions::new(4, 4), &config), &no_meta());
        assert!(svg.contains(r#"data-hysteresis-low="0.25""#));
    }

    #[test]
    fn metadata_is_escaped() {
        let metadata = SvgMetadata {
            title: Some("a <b> & c"),
            description: Some("line \"one\""),
            config_json: Some(r#"{"threshold":0.5}"#),
        };
        let svg = to_svg(&drawing(vec![]), &metadata);
        assert!(svg.contains("<title>a &lt;b&gt; &amp; c</title>"));
        assert!(svg.contains("<desc>"));
        assert!(svg.contains("<linework:pipeline"));
        assert!(svg.contains("threshold"));
    }

    // --- read_svg_paths ---

    #[test]
    fn reads_back_what_it_writes() {
        let square = [(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0), (0.0, 0.0)];
        let original = drawing(vec![
            path(&[(1.5, 2.0), (30.0, 4.25), (31.0, 40.0)], false, 0.8),
            path(&square, true, 0.6),
            path(&[(9.0, 9.0)], false, 0.5),
        ]);
        let parsed = read_svg_paths(&to_svg(&original, &no_meta())).unwrap();

        assert_eq!(parsed.len(), 3);
        for (read, written) in parsed.iter().zip(&original.paths) {
            assert_eq!(read.closed, written.closed);
            assert_eq!(read.points.as_slice(), written.polyline.points());
            let confidence = read.confidence.unwrap();
            assert!((confidence - written.confidence).abs() < 1e-4);
        }
    }

    #[test]
    fn relative_and_axis_commands() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><path d="m1,1 l2,0 v3 H0 z"/></svg>"#;
        let parsed = read_svg_paths(svg).unwrap();
        assert_eq!(parsed.len(), 1);
        let expected = [(1.0, 1.0), (3.0, 1.0), (3.0, 4.0), (0.0, 4.0), (1.0, 1.0)]
            .map(|(x, y)| Point::new(x, y));
        assert_eq!(parsed[0].points, expected);
        assert!(parsed[0].closed);
        assert_eq!(parsed[0].confidence, None);
    }

    #[test]
    fn each_subpath_is_separate() {
        let svg = r#"<svg><path d="M0,0 L1,1 M5,5 L6,6 L7,7"/></svg>"#;
        let parsed = read_svg_paths(svg).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].points.len(), 3);
    }

    #[test]
    fn curves_are_rejected() {
        let svg = r#"<svg><path d="M0,0 C1,1 2,2 3,3"/></svg>"#;
        assert!(matches!(read_svg_paths(svg), Err(ExportError::SvgParse(_))));
    }
}
