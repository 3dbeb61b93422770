//! PNG overlay of a pipeline run for visual inspection.
//!
//! The confidence raster is drawn as a grayscale background, with the
//! skeleton pixels tinted on top, the accepted paths stroked over them,
//! and the graph's junctions and endpoints marked with dots. Every raster
//! pixel becomes a `scale x scale` block so thin strokes stay visible.
//!
//! Rendering uses [`tiny_skia`] for anti-aliased strokes.

use linework_pipeline::{NodeKind, Point, StagedResult};
use tiny_skia::{
    Color, FillRule, LineCap, LineJoin, Paint, PathBuilder, Pixmap, Stroke, Transform,
};

use crate::error::ExportError;

/// Overlay appearance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    /// Output pixels per raster pixel.
    pub scale: u32,
    /// Width of the path strokes in output pixels.
    pub line_width: f32,
    /// Draw junction and endpoint markers.
    pub show_nodes: bool,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            scale: 4,
            line_width: 1.5,
            show_nodes: true,
        }
    }
}

const SKELETON_RGB: [u8; 3] = [40, 110, 220];
const PATH_RGBA: [u8; 4] = [230, 40, 40, 220];
const JUNCTION_RGBA: [u8; 4] = [40, 200, 60, 255];
const ENDPOINT_RGBA: [u8; 4] = [250, 200, 30, 255];

/// Render the overlay for a completed run.
///
/// # Errors
///
/// Returns [`ExportError::EmptyCanvas`] if the raster (or `style.scale`)
/// is zero-sized.
#[allow(clippy::cast_possible_truncation)]
pub fn render_overlay(result: &StagedResult, style: &OverlayStyle) -> Result<Pixmap, ExportError> {
    let dims = result.dimensions();
    let scale = style.scale.max(1);
    let (width, height) = (
        dims.width.saturating_mul(scale),
        dims.height.saturating_mul(scale),
    );
    let Some(mut pixmap) = Pixmap::new(width, height) else {
        return Err(ExportError::EmptyCanvas(dims));
    };

    paint_background(&mut pixmap, result, scale);

    let s = scale as f32;
    let to_canvas = |p: Point| ((p.x as f32 + 0.5) * s, (p.y as f32 + 0.5) * s);

    let stroke = Stroke {
        width: style.line_width,
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Stroke::default()
    };
    let path_paint = solid(PATH_RGBA);
    for polyline in result.drawing.polylines() {
        let points = polyline.points();
        let mut pb = PathBuilder::new();
        if let Some(&first) = points.first() {
            let (x, y) = to_canvas(first);
            pb.move_to(x, y);
            if points.len() == 1 {
                pb.line_to(x, y);
            }
            for &p in &points[1..] {
                let (x, y) = to_canvas(p);
                pb.line_to(x, y);
            }
        }
        if let Some(path) = pb.finish() {
            pixmap.stroke_path(&path, &path_paint, &stroke, Transform::identity(), None);
        }
    }

    if style.show_nodes {
        let radius = (s * 0.4).max(1.0);
        for (_, node) in result.graph.nodes() {
            let rgba = match node.kind {
                NodeKind::Junction => JUNCTION_RGBA,
                NodeKind::Endpoint => ENDPOINT_RGBA,
                NodeKind::Isolated | NodeKind::LoopAnchor => continue,
            };
            let (cx, cy) = to_canvas(node.pixel.to_point());
            if let Some(dot) = PathBuilder::from_circle(cx, cy, radius) {
                pixmap.fill_path(&dot, &solid(rgba), FillRule::Winding, Transform::identity(), None);
            }
        }
    }

    Ok(pixmap)
}

/// Render and encode as PNG bytes.
///
/// # Errors
///
/// Returns [`ExportError::EmptyCanvas`] for a zero-sized raster and
/// [`ExportError::PngEncode`] if encoding fails.
pub fn render_overlay_png(result: &StagedResult, style: &OverlayStyle) -> Result<Vec<u8>, ExportError> {
    let pixmap = render_overlay(result, style)?;
    pixmap
        .encode_png()
        .map_err(|e| ExportError::PngEncode(e.to_string()))
}

/// Grayscale confidence with skeleton pixels tinted. Fully opaque, so the
/// premultiplied bytes equal the straight ones.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn paint_background(pixmap: &mut Pixmap, result: &StagedResult, scale: u32) {
    let dims = result.dimensions();
    let width = pixmap.width() as usize;
    let skeleton = result.skeleton.mask();
    let data = pixmap.data_mut();

    for pixel in (0..dims.pixel_count()).map(|i| dims.pixel_at(i)) {
        let v = (result.raster.get(pixel) * 255.0).round() as u8;
        let rgb = if skeleton.contains(pixel) {
            SKELETON_RGB
        } else {
            [v, v, v]
        };
        for dy in 0..scale {
            let row = (pixel.y * scale + dy) as usize;
            for dx in 0..scale {
                let col = (pixel.x * scale + dx) as usize;
                let off = (row * width + col) * 4;
                data[off..off + 4].copy_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
            }
        }
    }
}

fn solid(rgba: [u8; 4]) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(Color::from_rgba8(rgba[0], rgba[1], rgba[2], rgba[3]));
    paint.anti_alias = true;
    paint
}
