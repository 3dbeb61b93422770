//! linework: vectorize line-drawing confidence maps from the command line.
//!
//! Reads confidence-map images (or directories of them), runs the
//! vectorization pipeline on each, and writes one SVG per input, plus an
//! optional PNG overlay. Per-stage diagnostics are printed as a report or
//! as JSON. A failing input is reported and skipped; the exit status is
//! non-zero if any input failed.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin linework -- [OPTIONS] <INPUTS>...
//! ```
//!
//! Logging goes to stderr and follows `RUST_LOG` (default `info`, or
//! `debug` with `--verbose`).

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod inputs;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use linework_export::{OverlayStyle, SvgMetadata, render_overlay_png, to_svg};
use linework_pipeline::diagnostics::{Clock, PipelineDiagnostics, process_with_diagnostics};
use linework_pipeline::metrics::{OverlapScores, overlap, rasterize_drawing};
use linework_pipeline::{ConfidenceAggregate, PipelineConfig, raster_from_image_bytes};

/// Turn predicted line-drawing confidence maps into SVG strokes.
///
/// Each input image is read as a per-pixel confidence map (brighter means
/// more likely a line, unless `--invert` is given), thresholded, thinned,
/// traced into polylines and written as `<stem>.svg` in the output
/// directory.
#[derive(Parser)]
#[command(name = "linework", version)]
struct Cli {
    /// Confidence-map images (PNG, JPEG, BMP, WebP) or directories of them.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory for SVG and overlay output.
    #[arg(short, long, default_value = "out")]
    out_dir: PathBuf,

    /// Binarization threshold in (0, 1).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_THRESHOLD)]
    threshold: f32,

    /// Enable hysteresis with this low threshold (must be below `--threshold`).
    #[arg(long)]
    hysteresis_low: Option<f32>,

    /// RDP simplification tolerance in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_SIMPLIFY_TOLERANCE_PX)]
    simplify_tolerance: f64,

    /// Largest bend, in degrees, for merging two strokes through a junction.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MERGE_ANGLE_TOLERANCE_DEG)]
    merge_angle: f64,

    /// Drop strokes shorter than this many pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MIN_LENGTH_PX)]
    min_length: f64,

    /// Drop strokes whose confidence is below this value.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MIN_CONFIDENCE)]
    min_confidence: f32,

    /// How per-pixel confidences along a stroke are combined.
    #[arg(long, value_enum, default_value_t = Aggregate::Mean)]
    aggregate: Aggregate,

    /// Endpoints closer than this (pixels) make a path closed.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CLOSED_PATH_EPSILON_PX)]
    closed_epsilon: f64,

    /// Fail an input whose drawing ends up empty.
    #[arg(long)]
    strict: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// The JSON must be a valid `PipelineConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,

    /// Treat dark pixels as lines (scanned ink on paper).
    #[arg(long)]
    invert: bool,

    /// Also write `<stem>.overlay.png`.
    #[arg(long)]
    overlay: bool,

    /// Overlay pixels per raster pixel.
    #[arg(long, default_value_t = 4, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..=32))]
    overlay_scale: u32,

    /// Directory of ground-truth line masks with the same file names;
    /// prints IoU and Dice of each rasterized drawing against its mask.
    #[arg(long)]
    ground_truth: Option<PathBuf>,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Debug-level logging (overridden by `RUST_LOG`).
    #[arg(short, long)]
    verbose: bool,
}

/// Confidence aggregate selection.
#[derive(Clone, Copy, ValueEnum)]
enum Aggregate {
    /// Arithmetic mean.
    Mean,
    /// Weakest pixel.
    Min,
    /// Mean after trimming the extremes.
    TrimmedMean,
}

impl From<Aggregate> for ConfidenceAggregate {
    fn from(a: Aggregate) -> Self {
        match a {
            Aggregate::Mean => Self::Mean,
            Aggregate::Min => Self::Min,
            Aggregate::TrimmedMean => Self::TrimmedMean,
        }
    }
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Either way the result is
/// validated before any input is read.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    let config = if let Some(ref json) = cli.config_json {
        serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?
    } else {
        PipelineConfig {
            threshold: cli.threshold,
            hysteresis_low_threshold: cli.hysteresis_low,
            simplify_tolerance_px: cli.simplify_tolerance,
            merge_angle_tolerance_deg: cli.merge_angle,
            min_length_px: cli.min_length,
            min_confidence: cli.min_confidence,
            confidence_aggregate: cli.aggregate.into(),
            closed_path_epsilon_px: cli.closed_epsilon,
            strict: cli.strict,
            ..PipelineConfig::default()
        }
    };
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

/// One input's JSON record.
#[derive(Serialize)]
struct Record<'a> {
    input: String,
    diagnostics: &'a PipelineDiagnostics,
    #[serde(skip_serializing_if = "Option::is_none")]
    overlap: Option<OverlapScores>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let files = match inputs::collect_inputs(&cli.inputs) {
        Ok(files) => files,
        Err(e) => {
            eprintln!("Error listing inputs: {e}");
            return ExitCode::FAILURE;
        }
    };
    if files.is_empty() {
        eprintln!("No input images found");
        return ExitCode::FAILURE;
    }

    if let Err(e) = std::fs::create_dir_all(&cli.out_dir) {
        eprintln!("Error creating {}: {e}", cli.out_dir.display());
        return ExitCode::FAILURE;
    }

    tracing::info!(inputs = files.len(), out_dir = %cli.out_dir.display(), "starting");
    tracing::debug!(?config, "pipeline config");

    let mut failed = 0usize;
    let mut scores = Vec::new();
    for file in &files {
        match run_one(&cli, &config, file) {
            Ok(overlap) => scores.extend(overlap),
            Err(msg) => {
                tracing::error!(input = %file.display(), "{msg}");
                failed += 1;
            }
        }
    }

    if !scores.is_empty() {
        print_overlap_summary(&scores);
    }

    tracing::info!(processed = files.len() - failed, failed, "done");
    if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Vectorize one file and write its outputs.
fn run_one(cli: &Cli, config: &PipelineConfig, file: &Path) -> Result<Option<OverlapScores>, String> {
    let bytes = std::fs::read(file).map_err(|e| format!("Error reading input: {e}"))?;
    let raster = raster_from_image_bytes(&bytes, cli.invert).map_err(|e| e.to_string())?;
    let (staged, diagnostics) =
        process_with_diagnostics(raster, None, config, &StdClock).map_err(|e| e.to_string())?;

    let stem = file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("drawing");

    let config_json = serde_json::to_string(config).map_err(|e| e.to_string())?;
    let metadata = SvgMetadata {
        title: Some(stem),
        description: Some("Vectorized by linework"),
        config_json: Some(&config_json),
    };
    let svg_path = cli.out_dir.join(format!("{stem}.svg"));
    std::fs::write(&svg_path, to_svg(&staged.drawing, &metadata))
        .map_err(|e| format!("Error writing {}: {e}", svg_path.display()))?;
    tracing::info!(
        output = %svg_path.display(),
        paths = staged.drawing.len(),
        "wrote SVG"
    );

    if cli.overlay {
        let style = OverlayStyle {
            scale: cli.overlay_scale,
            ..OverlayStyle::default()
        };
        let png = render_overlay_png(&staged, &style).map_err(|e| e.to_string())?;
        let overlay_path = cli.out_dir.join(format!("{stem}.overlay.png"));
        std::fs::write(&overlay_path, png)
            .map_err(|e| format!("Error writing {}: {e}", overlay_path.display()))?;
    }

    let overlap = match &cli.ground_truth {
        Some(dir) => Some(ground_truth_overlap(dir, file, cli.invert, &staged.drawing)?),
        None => None,
    };

    if cli.json {
        let record = Record {
            input: file.display().to_string(),
            diagnostics: &diagnostics,
            overlap,
        };
        let json = serde_json::to_string_pretty(&record)
            .map_err(|e| format!("Error serializing diagnostics: {e}"))?;
        println!("{json}");
    } else {
        println!("{}\n{}", file.display(), diagnostics.report());
        if let Some(scores) = overlap {
            println!("IoU: {:.4}  |  Dice: {:.4}", scores.iou, scores.dice);
        }
        println!();
    }

    Ok(overlap)
}

/// Score the drawing against the same-named mask in `dir`.
fn ground_truth_overlap(
    dir: &Path,
    file: &Path,
    invert: bool,
    drawing: &linework_pipeline::VectorDrawing,
) -> Result<OverlapScores, String> {
    let name = file.file_name().ok_or("input has no file name")?;
    let truth_path = dir.join(name);
    let bytes = std::fs::read(&truth_path)
        .map_err(|e| format!("Error reading {}: {e}", truth_path.display()))?;
    let truth = raster_from_image_bytes(&bytes, invert).map_err(|e| e.to_string())?;
    let truth = linework_pipeline::threshold::threshold(&truth, 0.5);
    overlap(&truth, &rasterize_drawing(drawing)).map_err(|e| e.to_string())
}

#[allow(clippy::cast_precision_loss)]
fn print_overlap_summary(scores: &[OverlapScores]) {
    let n = scores.len() as f64;
    let iou = scores.iter().map(|s| s.iou).sum::<f64>() / n;
    let dice = scores.iter().map(|s| s.dice).sum::<f64>() / n;
    eprintln!("Mean over {} inputs: IoU={iou:.4}  Dice={dice:.4}", scores.len());
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}
