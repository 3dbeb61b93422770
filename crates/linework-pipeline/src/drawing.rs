//! The [`VectorDrawing`]: accepted strokes as open or closed paths, plus
//! the raster metadata needed to place them.

use serde::{Deserialize, Serialize};

use crate::score::Scoring;
use crate::types::{Dimensions, PipelineConfig, PipelineError, Polyline};

/// One output path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorPath {
    /// Path geometry in raster pixel coordinates.
    ///
    /// For a closed path the last point repeats (or nearly repeats) the
    /// first; writers may drop it and emit a close command instead.
    pub polyline: Polyline,
    /// Aggregated confidence in `[0, 1]`.
    pub confidence: f32,
    /// Whether the path is a closed ring.
    pub closed: bool,
    /// Graph edges the path was built from.
    pub source_edges: Vec<usize>,
}

/// The final vectorization result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorDrawing {
    /// Dimensions of the source raster; also the coordinate space.
    pub dimensions: Dimensions,
    /// Binarization threshold used.
    pub threshold: f32,
    /// Hysteresis low threshold, when hysteresis was used.
    pub hysteresis_low_threshold: Option<f32>,
    /// Paths in deterministic order.
    pub paths: Vec<VectorPath>,
}

impl VectorDrawing {
    /// An empty drawing for `dimensions`.
    #[must_use]
    pub const fn empty(dimensions: Dimensions, config: &PipelineConfig) -> Self {
        Self {
            dimensions,
            threshold: config.threshold,
            hysteresis_low_threshold: config.hysteresis_low_threshold,
            paths: Vec::new(),
        }
    }

    /// Returns `true` if the drawing has no paths.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Number of paths.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.paths.len()
    }

    /// Path geometries in order.
    pub fn polylines(&self) -> impl Iterator<Item = &Polyline> + '_ {
        self.paths.iter().map(|p| &p.polyline)
    }

    /// Total number of points across all paths.
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.paths.iter().map(|p| p.polyline.len()).sum()
    }

    /// Number of closed paths.
    #[must_use]
    pub fn closed_count(&self) -> usize {
        self.paths.iter().filter(|p| p.closed).count()
    }
}

/// Build the drawing from the accepted strokes.
///
/// A path is closed when it has at least three points and its ends lie
/// within `closed_path_epsilon_px` of each other.
///
/// # Errors
///
/// Returns [`PipelineError::Serialization`] when `config.strict` is set
/// and no stroke was accepted.
pub fn assemble(
    scoring: &Scoring,
    dimensions: Dimensions,
    config: &PipelineConfig,
) -> Result<VectorDrawing, PipelineError> {
    if config.strict && scoring.accepted.is_empty() {
        return Err(PipelineError::Serialization(format!(
            "no strokes survived for {dimensions} raster ({} too short, {} below confidence)",
            scoring.dropped_short, scoring.dropped_low_confidence
        )));
    }

    let mut drawing = VectorDrawing::empty(dimensions, config);
    drawing.paths = scoring
        .accepted
        .iter()
        .map(|stroke| VectorPath {
            closed: stroke.polyline.is_closed(config.closed_path_epsilon_px),
            polyline: stroke.polyline.clone(),
            confidence: stroke.confidence,
            source_edges: stroke.source_edges.clone(),
        })
        .collect();
    Ok(drawing)
}
