//! linework-pipeline: confidence rasters to vector line drawings (sans-IO).
//!
//! Turns a per-pixel line-confidence map into polylines through:
//! threshold -> skeletonize -> skeleton graph -> extract, simplify and
//! merge strokes -> confidence scoring -> [`VectorDrawing`].
//!
//! This crate does **no I/O**. It works on in-memory rasters and returns
//! structured data; SVG and PNG writing live in `linework-export`, file
//! handling in the `linework` CLI.

pub mod batch;
pub mod diagnostics;
pub mod drawing;
pub mod extract;
pub mod graph;
pub mod metrics;
pub mod pipeline;
pub mod raster;
pub mod raster_io;
pub mod score;
pub mod simplify;
pub mod skeleton;
pub mod threshold;
pub mod types;

pub use batch::process_batch;
pub use diagnostics::{Clock, PipelineDiagnostics, StageMetrics, process_with_diagnostics};
pub use drawing::{VectorDrawing, VectorPath};
pub use graph::{NodeKind, SkeletonGraph};
pub use pipeline::{Pipeline, PipelineStage, Stage, StagedResult};
pub use raster::{BinaryMask, OffsetField, Raster};
pub use raster_io::raster_from_image_bytes;
pub use skeleton::Skeleton;
pub use types::{
    ConfidenceAggregate, Dimensions, PipelineConfig, PipelineError, Pixel, Point, Polyline,
};

/// Vectorize one raster.
///
/// # Pipeline steps
///
/// 1. Validate the config
/// 2. Binarize (plain threshold, or hysteresis when a low threshold is set)
/// 3. Thin to a 1 px skeleton
/// 4. Build the skeleton graph (endpoints, junctions, loops)
/// 5. Trace, simplify and merge strokes through junctions
/// 6. Score each stroke against the raster, drop short or faint ones
/// 7. Assemble the drawing
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` is invalid.
/// Returns [`PipelineError::Serialization`] if `config.strict` is set and
/// nothing survived filtering.
pub fn process(raster: &Raster, config: &PipelineConfig) -> Result<VectorDrawing, PipelineError> {
    Ok(process_staged(raster.clone(), None, config)?.drawing)
}

/// Vectorize one raster, refining skeleton points with `offsets` when
/// `config.apply_offsets` is set.
///
/// # Errors
///
/// As [`process`], plus [`PipelineError::Shape`] if `offsets` does not
/// match the raster.
pub fn process_with_offsets(
    raster: &Raster,
    offsets: &OffsetField,
    config: &PipelineConfig,
) -> Result<VectorDrawing, PipelineError> {
    Ok(process_staged(raster.clone(), Some(offsets.clone()), config)?.drawing)
}

/// Run every stage and keep all intermediates.
///
/// # Errors
///
/// As [`process_with_offsets`].
pub fn process_staged(
    raster: Raster,
    offsets: Option<OffsetField>,
    config: &PipelineConfig,
) -> Result<StagedResult, PipelineError> {
    let mut pending = Pipeline::new(raster, config.clone());
    if let Some(offsets) = offsets {
        pending = pending.with_offsets(offsets);
    }
    let result = pending
        .threshold()?
        .skeletonize()
        .build_graph()
        .extract()
        .score()
        .serialize()?
        .into_result();
    tracing::debug!(
        dimensions = %result.dimensions(),
        paths = result.drawing.len(),
        "vectorized raster"
    );
    Ok(result)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn cross(size: u32) -> Raster {
        let mid = size / 2;
        Raster::from_fn(Dimensions::new(size, size), |x, y| {
            if (x == mid && y > 0 && y + 1 < size) || (y == mid && x > 0 && x + 1 < size) {
                0.8
            } else {
                0.0
            }
        })
    }

    #[test]
    fn process_matches_staged_drawing() {
        let raster = cross(11);
        let config = PipelineConfig::default();
        let drawing = process(&raster, &config).unwrap();
        let staged = process_staged(raster, None, &config).unwrap();
        assert_eq!(drawing, staged.drawing);
        assert_eq!(drawing.len(), 4);
    }

    #[test]
    fn invalid_config_is_rejected_before_processing() {
        let config = PipelineConfig {
            threshold: 1.5,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            process(&cross(5), &config),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn offsets_must_match_raster() {
        let offsets = OffsetField::try_new(Dimensions::new(2, 2), vec![[0.0, 0.0]; 4]).unwrap();
        let config = PipelineConfig {
            apply_offsets: true,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            process_with_offsets(&cross(5), &offsets, &config),
            Err(PipelineError::Shape(_))
        ));
    }

    #[test]
    fn uniform_offsets_shift_the_drawing() {
        let raster = Raster::from_fn(Dimensions::new(12, 5), |x, y| {
            if y == 2 && (1..11).contains(&x) { 0.9 } else { 0.0 }
        });
        let offsets = OffsetField::try_new(raster.dimensions(), vec![[0.0, 0.25]; 60]).unwrap();
        let config = PipelineConfig {
            apply_offsets: true,
            ..PipelineConfig::default()
        };
        let drawing = process_with_offsets(&raster, &offsets, &config).unwrap();
        assert_eq!(drawing.len(), 1);
        assert!(drawing.paths[0]
            .polyline
            .points()
            .iter()
            .all(|p| (p.y - 2.25).abs() < 1e-9));
    }
}
