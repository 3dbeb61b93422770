//! Binarization of the confidence raster.
//!
//! A single threshold keeps every pixel at or above it. Hysteresis adds
//! a lower threshold: weak pixels survive only when 8-connected, through
//! other weak-or-strong pixels, to a strong one. This keeps faint but
//! continuous strokes in one piece without admitting isolated noise.
//!
//! This is the first step in the pipeline, between the model output and
//! skeletonization.

use crate::raster::{BinaryMask, RING, Raster};
use crate::types::{PipelineConfig, Pixel};

/// Binarize with the thresholds from `config`.
///
/// Uses hysteresis when `config.hysteresis_low_threshold` is set.
#[must_use = "returns the binary mask"]
pub fn binarize(raster: &Raster, config: &PipelineConfig) -> BinaryMask {
    match config.hysteresis_low_threshold {
        Some(low) => hysteresis(raster, low, config.threshold),
        None => threshold(raster, config.threshold),
    }
}

/// Keep every pixel whose confidence is at least `threshold`.
#[must_use = "returns the binary mask"]
pub fn threshold(raster: &Raster, threshold: f32) -> BinaryMask {
    let bits = raster.values().iter().map(|&v| v >= threshold).collect();
    BinaryMask::from_bits(raster.dimensions(), bits)
}

/// Two-threshold binarization.
///
/// Pixels at or above `high` seed the mask; a depth-first flood then
/// admits every 8-connected pixel at or above `low`. Seeds are visited
/// in row-major order, although the result does not depend on it.
#[must_use = "returns the binary mask"]
pub fn hysteresis(raster: &Raster, low: f32, high: f32) -> BinaryMask {
    let dims = raster.dimensions();
    let values = raster.values();
    let mut bits = vec![false; dims.pixel_count()];
    let mut stack = Vec::new();

    for (seed, &value) in values.iter().enumerate() {
        if value < high || bits[seed] {
            continue;
        }
        bits[seed] = true;
        stack.push(dims.pixel_at(seed));

        while let Some(p) = stack.pop() {
            for (dx, dy) in RING {
                let nx = i64::from(p.x) + dx;
                let ny = i64::from(p.y) + dy;
                let (Ok(nx), Ok(ny)) = (u32::try_from(nx), u32::try_from(ny)) else {
                    continue;
                };
                let neighbor = Pixel::new(nx, ny);
                let Some(i) = dims.index_of(neighbor) else {
                    continue;
                };
                if !bits[i] && values[i] >= low {
                    bits[i] = true;
                    stack.push(neighbor);
                }
            }
        }
    }

    BinaryMask::from_bits(dims, bits)
}
