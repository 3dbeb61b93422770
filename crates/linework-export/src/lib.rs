//! linework-export: output formats for vectorized drawings (sans-IO).
//!
//! Writes a [`VectorDrawing`](linework_pipeline::VectorDrawing) as SVG,
//! reads straight-line SVG paths back, and renders PNG overlays of a
//! pipeline run. Everything works on in-memory values; callers do the
//! file I/O.

pub mod error;
pub mod overlay;
pub mod svg;

pub use error::ExportError;
pub use overlay::{OverlayStyle, render_overlay, render_overlay_png};
pub use svg::{ParsedPath, SvgMetadata, build_path_data, read_svg_paths, to_svg};
