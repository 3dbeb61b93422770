//! Vectorize many rasters with one config.
//!
//! Every raster is independent: one failure is reported in its own slot
//! and does not stop the others. With the `parallel` feature the rasters
//! are spread across the rayon thread pool.

use crate::drawing::VectorDrawing;
use crate::raster::Raster;
use crate::types::{PipelineConfig, PipelineError};

/// One result per input raster, in input order.
#[must_use = "each raster's result should be checked"]
pub fn process_batch(
    rasters: &[Raster],
    config: &PipelineConfig,
) -> Vec<Result<VectorDrawing, PipelineError>> {
    #[cfg(feature = "parallel")]
    let results: Vec<_> = {
        use rayon::prelude::*;
        rasters
            .par_iter()
            .map(|raster| crate::process(raster, config))
            .collect()
    };

    #[cfg(not(feature = "parallel"))]
    let results: Vec<_> = rasters
        .iter()
        .map(|raster| crate::process(raster, config))
        .collect();

    let failed = results.iter().filter(|r| r.is_err()).count();
    tracing::info!(rasters = rasters.len(), failed, "batch complete");
    results
}
