//! Per-stroke confidence and the final accept/drop filter.
//!
//! A stroke's confidence is an aggregate of the raster values under its
//! source pixel chain. Strokes shorter than `min_length_px` or less
//! confident than `min_confidence` are dropped here and nowhere else;
//! drops are reported as counts.

use serde::{Deserialize, Serialize};

use crate::extract::Stroke;
use crate::raster::Raster;
use crate::types::{ConfidenceAggregate, PipelineConfig, Polyline};

/// Fraction of the sorted values cut from *each* end by
/// [`ConfidenceAggregate::TrimmedMean`].
pub const TRIM_FRACTION: f64 = 0.1;

/// A stroke that passed the filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredStroke {
    /// Simplified geometry.
    pub polyline: Polyline,
    /// Aggregated confidence in `[0, 1]`.
    pub confidence: f32,
    /// Arc length of `polyline` in pixels.
    pub length: f64,
    /// Graph edges the stroke was built from.
    pub source_edges: Vec<usize>,
}

/// Output of [`score`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scoring {
    /// Accepted strokes, in input order.
    pub accepted: Vec<ScoredStroke>,
    /// Strokes dropped for being shorter than `min_length_px`.
    pub dropped_short: usize,
    /// Strokes long enough but below `min_confidence`.
    pub dropped_low_confidence: usize,
}

impl Scoring {
    /// Mean confidence over accepted strokes, or `None` if there are none.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_confidence(&self) -> Option<f64> {
        if self.accepted.is_empty() {
            return None;
        }
        let sum: f64 = self.accepted.iter().map(|s| f64::from(s.confidence)).sum();
        Some(sum / self.accepted.len() as f64)
    }
}

/// Reduce `values` to one confidence. Empty input scores `0.0`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn aggregate(values: &[f32], method: ConfidenceAggregate) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let value = match method {
        ConfidenceAggregate::Mean => mean(values),
        ConfidenceAggregate::Min => values.iter().copied().fold(f32::INFINITY, f32::min).into(),
        ConfidenceAggregate::TrimmedMean => {
            let mut sorted = values.to_vec();
            sorted.sort_by(f32::total_cmp);
            let cut = (sorted.len() as f64 * TRIM_FRACTION).floor() as usize;
            mean(&sorted[cut..sorted.len() - cut])
        }
    };
    (value as f32).clamp(0.0, 1.0)
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f32]) -> f64 {
    values.iter().copied().map(f64::from).sum::<f64>() / values.len() as f64
}

/// Score every stroke against `raster` and apply the length and
/// confidence filters from `config`.
#[must_use = "returns the scoring result"]
pub fn score(strokes: Vec<Stroke>, raster: &Raster, config: &PipelineConfig) -> Scoring {
    let mut scoring = Scoring::default();
    for stroke in strokes {
        let length = stroke.polyline.length();
        if length < config.min_length_px {
            scoring.dropped_short += 1;
            continue;
        }
        let values: Vec<f32> = stroke.pixels.iter().map(|&p| raster.get(p)).collect();
        let confidence = aggregate(&values, config.confidence_aggregate);
        if confidence < config.min_confidence {
            scoring.dropped_low_confidence += 1;
            continue;
        }
        scoring.accepted.push(ScoredStroke {
            polyline: stroke.polyline,
            confidence,
            length,
            source_edges: stroke.source_edges,
        });
    }

    tracing::info!(
        accepted = scoring.accepted.len(),
        dropped_short = scoring.dropped_short,
        dropped_low_confidence = scoring.dropped_low_confidence,
        "scored strokes"
    );

    scoring
}
