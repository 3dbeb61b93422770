//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! [`process_with_diagnostics`] drives the staged pipeline one step at a
//! time and records how long each step took and what it produced. Time
//! is read through the [`Clock`] trait so the core crate has no
//! dependency on a particular time source and tests can use a fake one.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::{Advance, Pipeline, Stage, StagedResult};
use crate::raster::{OffsetField, Raster};
use crate::types::{PipelineConfig, PipelineError};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of elapsed time.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// One entry per executed stage, in order.
    pub stages: Vec<StageDiagnostics>,
    /// Total wall-clock duration of the run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Stage name.
    pub name: String,
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Binarization.
    Threshold {
        /// High (or only) threshold.
        threshold: f32,
        /// Hysteresis low threshold, if used.
        hysteresis_low_threshold: Option<f32>,
        /// Foreground pixels in the mask.
        foreground_pixels: usize,
        /// Total pixel count, for density.
        total_pixels: u64,
    },
    /// Thinning.
    Skeletonize {
        /// Thinning rounds run.
        iterations: usize,
        /// Pixels left in the skeleton.
        skeleton_pixels: usize,
        /// Mask pixels removed by thinning.
        removed_pixels: usize,
        /// 8-connected components in the skeleton.
        components: usize,
    },
    /// Graph construction.
    Graph {
        /// Total nodes.
        nodes: usize,
        /// Total edges.
        edges: usize,
        /// Degree-1 nodes.
        endpoints: usize,
        /// Degree-3+ nodes.
        junctions: usize,
        /// Closed loops (anchor nodes).
        loops: usize,
        /// Lone pixels.
        isolated: usize,
    },
    /// Stroke extraction, simplification and merging.
    Extract {
        /// RDP tolerance in pixels.
        tolerance: f64,
        /// Strokes produced.
        strokes: usize,
        /// Node continuations that joined two edges.
        merges: usize,
        /// Dot strokes from isolated nodes.
        dots: usize,
        /// Total simplified points.
        points: usize,
    },
    /// Confidence scoring and filtering.
    Score {
        /// Aggregate used.
        aggregate: String,
        /// Strokes kept.
        accepted: usize,
        /// Strokes dropped as too short.
        dropped_short: usize,
        /// Strokes dropped as too faint.
        dropped_low_confidence: usize,
        /// Mean confidence of kept strokes.
        mean_confidence: Option<f64>,
    },
    /// Drawing assembly.
    Serialize {
        /// Output paths.
        paths: usize,
        /// Of which closed.
        closed_paths: usize,
        /// Total output points.
        points: usize,
    },
}

/// High-level summary counts for the entire run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Raster width in pixels.
    pub image_width: u32,
    /// Raster height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Paths in the drawing.
    pub path_count: usize,
    /// Points in the drawing.
    pub point_count: usize,
}

impl PipelineSummary {
    fn from_result(result: &StagedResult) -> Self {
        let dims = result.dimensions();
        Self {
            image_width: dims.width,
            image_height: dims.height,
            pixel_count: u64::from(dims.width) * u64::from(dims.height),
            path_count: result.drawing.len(),
            point_count: result.drawing.point_count(),
        }
    }
}

impl PipelineDiagnostics {
    /// Diagnostics for the stage called `name`, if it ran.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageDiagnostics> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Raster: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<16} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for stage in &self.stages {
            let ms = duration_ms(stage.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&stage.metrics);
            lines.push(format!("{:<16} {ms:>8.3}ms {pct:>9.1}%  {details}", stage.name));
        }

        lines.push(String::new());
        lines.push(format!(
            "Paths: {}  |  Points: {}",
            self.summary.path_count, self.summary.point_count,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Threshold {
            threshold,
            hysteresis_low_threshold,
            foreground_pixels,
            total_pixels,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixels > 0 {
                *foreground_pixels as f64 / *total_pixels as f64 * 100.0
            } else {
                0.0
            };
            let low = hysteresis_low_threshold.map_or_else(String::new, |l| format!(" low={l:.2}"));
            format!("t={threshold:.2}{low} fg={foreground_pixels} ({density:.1}%)")
        }
        StageMetrics::Skeletonize {
            iterations,
            skeleton_pixels,
            removed_pixels,
            components,
        } => format!(
            "{iterations} rounds, {skeleton_pixels} px kept, {removed_pixels} removed, {components} components"
        ),
        StageMetrics::Graph {
            nodes,
            edges,
            endpoints,
            junctions,
            loops,
            isolated,
        } => format!(
            "{nodes} nodes ({endpoints} ends, {junctions} junctions, {loops} loops, {isolated} lone), {edges} edges"
        ),
        StageMetrics::Extract {
            tolerance,
            strokes,
            merges,
            dots,
            points,
        } => format!("tol={tolerance:.2} {strokes} strokes, {merges} merges, {dots} dots, {points} pts"),
        StageMetrics::Score {
            aggregate,
            accepted,
            dropped_short,
            dropped_low_confidence,
            mean_confidence,
        } => {
            let mean = mean_confidence.map_or_else(|| "-".to_owned(), |m| format!("{m:.3}"));
            format!(
                "{aggregate}: kept {accepted}, dropped {dropped_short} short + {dropped_low_confidence} faint, mean={mean}"
            )
        }
        StageMetrics::Serialize {
            paths,
            closed_paths,
            points,
        } => format!("{paths} paths ({closed_paths} closed), {points} pts"),
    }
}

/// Run the staged pipeline, timing every stage.
///
/// # Errors
///
/// Returns the first [`PipelineError`] raised by any stage.
pub fn process_with_diagnostics<C: Clock>(
    raster: Raster,
    offsets: Option<OffsetField>,
    config: &PipelineConfig,
    clock: &C,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    let start = clock.now();
    let mut pending = Pipeline::new(raster, config.clone());
    if let Some(offsets) = offsets {
        pending = pending.with_offsets(offsets);
    }

    let mut stage = Stage::from(pending);
    let mut stages = Vec::new();
    loop {
        let t = clock.now();
        match stage.advance()? {
            Advance::Next(next) => {
                let duration = clock.elapsed(&t);
                if let Some(metrics) = next.metrics() {
                    tracing::debug!(stage = next.name(), ?duration, "stage complete");
                    stages.push(StageDiagnostics {
                        name: next.name().to_owned(),
                        duration,
                        metrics,
                    });
                }
                stage = next;
            }
            Advance::Complete(done) => {
                stage = done;
                break;
            }
        }
    }

    let result = stage.complete()?;
    let diagnostics = PipelineDiagnostics {
        stages,
        total_duration: clock.elapsed(&start),
        summary: PipelineSummary::from_result(&result),
    };
    Ok((result, diagnostics))
}
