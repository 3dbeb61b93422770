//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::process`], which runs everything in one call and keeps
//! only the drawing, [`Pipeline`] lets the caller drive execution one
//! step at a time:
//!
//! ```rust
//! # use linework_pipeline::{Dimensions, Pipeline, PipelineConfig, PipelineError, Raster};
//! # fn run() -> Result<(), PipelineError> {
//! let raster = Raster::zeros(Dimensions::new(32, 32));
//! let staged = Pipeline::new(raster, PipelineConfig::default())
//!     .threshold()?
//!     .skeletonize()
//!     .build_graph()
//!     .extract()
//!     .score()
//!     .serialize()?
//!     .into_result();
//! assert!(staged.drawing.is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next state (or a
//! `Result` for the two fallible steps), carrying every earlier
//! intermediate along. Skipping or reordering stages is a compile error.

use crate::diagnostics::StageMetrics;
use crate::drawing::VectorDrawing;
use crate::extract::Extraction;
use crate::graph::{NodeKind, SkeletonGraph};
use crate::raster::{BinaryMask, OffsetField, Raster};
use crate::score::Scoring;
use crate::skeleton::Skeleton;
use crate::types::{Dimensions, PipelineConfig, PipelineError};

/// Every intermediate of a completed run.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// The input raster.
    pub raster: Raster,
    /// Binarized raster.
    pub mask: BinaryMask,
    /// Thinned mask.
    pub skeleton: Skeleton,
    /// Skeleton graph.
    pub graph: SkeletonGraph,
    /// Strokes before scoring.
    pub extraction: Extraction,
    /// Accepted strokes and drop counts.
    pub scoring: Scoring,
    /// The output drawing.
    pub drawing: VectorDrawing,
}

impl StagedResult {
    /// Raster dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.raster.dimensions()
    }
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing.
///
/// Call [`threshold`](Self::threshold) to advance.
#[must_use = "pipeline stages are consumed by advancing; call .threshold() to continue"]
pub struct Pending {
    config: PipelineConfig,
    raster: Raster,
    offsets: Option<OffsetField>,
}

impl Pending {
    /// Attach a predicted offset field. It is checked against the raster
    /// in [`threshold`](Self::threshold) and only applied when
    /// `config.apply_offsets` is set.
    pub fn with_offsets(mut self, offsets: OffsetField) -> Self {
        self.offsets = Some(offsets);
        self
    }

    /// The input raster.
    #[must_use]
    pub const fn raster(&self) -> &Raster {
        &self.raster
    }

    /// Validate the configuration and inputs, then binarize.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the configuration is
    /// invalid, and [`PipelineError::Shape`] if the offset field does not
    /// match the raster.
    pub fn threshold(self) -> Result<Thresholded, PipelineError> {
        self.config.validate()?;
        if let Some(offsets) = &self.offsets {
            offsets.check_matches(&self.raster)?;
        }
        let mask = crate::threshold::binarize(&self.raster, &self.config);
        Ok(Thresholded {
            config: self.config,
            raster: self.raster,
            offsets: self.offsets,
            mask,
        })
    }
}

// ───────────────────────── Stage 1: Thresholded ──────────────────────

/// Pipeline state after binarization.
#[must_use = "pipeline stages are consumed by advancing; call .skeletonize() to continue"]
pub struct Thresholded {
    config: PipelineConfig,
    raster: Raster,
    offsets: Option<OffsetField>,
    mask: BinaryMask,
}

impl Thresholded {
    /// The binary mask.
    #[must_use]
    pub const fn mask(&self) -> &BinaryMask {
        &self.mask
    }

    /// Thin the mask to a 1-pixel skeleton.
    pub fn skeletonize(self) -> Skeletonized {
        let skeleton = crate::skeleton::skeletonize(&self.mask);
        Skeletonized {
            config: self.config,
            raster: self.raster,
            offsets: self.offsets,
            mask: self.mask,
            skeleton,
        }
    }
}

// ───────────────────────── Stage 2: Skeletonized ─────────────────────

/// Pipeline state after thinning.
#[must_use = "pipeline stages are consumed by advancing; call .build_graph() to continue"]
pub struct Skeletonized {
    config: PipelineConfig,
    raster: Raster,
    offsets: Option<OffsetField>,
    mask: BinaryMask,
    skeleton: Skeleton,
}

impl Skeletonized {
    /// The skeleton.
    #[must_use]
    pub const fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    /// Build the skeleton graph.
    pub fn build_graph(self) -> GraphBuilt {
        let graph = crate::graph::build_graph(&self.skeleton);
        GraphBuilt {
            config: self.config,
            raster: self.raster,
            offsets: self.offsets,
            mask: self.mask,
            skeleton: self.skeleton,
            graph,
        }
    }
}

// ───────────────────────── Stage 3: GraphBuilt ───────────────────────

/// Pipeline state after graph construction.
#[must_use = "pipeline stages are consumed by advancing; call .extract() to continue"]
pub struct GraphBuilt {
    config: PipelineConfig,
    raster: Raster,
    offsets: Option<OffsetField>,
    mask: BinaryMask,
    skeleton: Skeleton,
    graph: SkeletonGraph,
}

impl GraphBuilt {
    /// The skeleton graph.
    #[must_use]
    pub const fn graph(&self) -> &SkeletonGraph {
        &self.graph
    }

    /// Extract, simplify and merge strokes.
    pub fn extract(self) -> Extracted {
        let extraction = crate::extract::extract(&self.graph, self.offsets.as_ref(), &self.config);
        Extracted {
            config: self.config,
            raster: self.raster,
            mask: self.mask,
            skeleton: self.skeleton,
            graph: self.graph,
            extraction,
        }
    }
}

// ───────────────────────── Stage 4: Extracted ────────────────────────

/// Pipeline state after stroke extraction. The offset field is no
/// longer needed and has been dropped.
#[must_use = "pipeline stages are consumed by advancing; call .score() to continue"]
pub struct Extracted {
    config: PipelineConfig,
    raster: Raster,
    mask: BinaryMask,
    skeleton: Skeleton,
    graph: SkeletonGraph,
    extraction: Extraction,
}

impl Extracted {
    /// The extracted strokes.
    #[must_use]
    pub const fn extraction(&self) -> &Extraction {
        &self.extraction
    }

    /// Score strokes and drop the short or faint ones.
    pub fn score(self) -> Scored {
        let scoring =
            crate::score::score(self.extraction.strokes.clone(), &self.raster, &self.config);
        Scored {
            config: self.config,
            raster: self.raster,
            mask: self.mask,
            skeleton: self.skeleton,
            graph: self.graph,
            extraction: self.extraction,
            scoring,
        }
    }
}

// ───────────────────────── Stage 5: Scored ───────────────────────────

/// Pipeline state after scoring.
#[must_use = "pipeline stages are consumed by advancing; call .serialize() to continue"]
pub struct Scored {
    config: PipelineConfig,
    raster: Raster,
    mask: BinaryMask,
    skeleton: Skeleton,
    graph: SkeletonGraph,
    extraction: Extraction,
    scoring: Scoring,
}

impl Scored {
    /// Accepted strokes and drop counts.
    #[must_use]
    pub const fn scoring(&self) -> &Scoring {
        &self.scoring
    }

    /// Assemble the [`VectorDrawing`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Serialization`] in strict mode when no
    /// stroke was accepted.
    pub fn serialize(self) -> Result<Serialized, PipelineError> {
        let drawing =
            crate::drawing::assemble(&self.scoring, self.raster.dimensions(), &self.config)?;
        Ok(Serialized {
            raster: self.raster,
            mask: self.mask,
            skeleton: self.skeleton,
            graph: self.graph,
            extraction: self.extraction,
            scoring: self.scoring,
            drawing,
        })
    }
}

// ───────────────────────── Stage 6: Serialized ───────────────────────

/// The final stage. Call [`into_result`](Self::into_result) to take
/// every intermediate.
#[must_use = "call .into_result() to extract the StagedResult"]
pub struct Serialized {
    raster: Raster,
    mask: BinaryMask,
    skeleton: Skeleton,
    graph: SkeletonGraph,
    extraction: Extraction,
    scoring: Scoring,
    drawing: VectorDrawing,
}

impl Serialized {
    /// The output drawing.
    #[must_use]
    pub const fn drawing(&self) -> &VectorDrawing {
        &self.drawing
    }

    /// Consume the pipeline and return the full [`StagedResult`].
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        StagedResult {
            raster: self.raster,
            mask: self.mask,
            skeleton: self.skeleton,
            graph: self.graph,
            extraction: self.extraction,
            scoring: self.scoring,
            drawing: self.drawing,
        }
    }
}

// ──────────────────── PipelineStage trait + Stage enum ────────────────

/// Total number of stages in the pipeline.
pub const STAGE_COUNT: usize = 7;

/// Common interface over the stage structs.
pub trait PipelineStage: Sized {
    /// Short stage name (e.g. `"threshold"`).
    const NAME: &str;

    /// Zero-based position (`0` for [`Pending`] through `6` for
    /// [`Serialized`]).
    const INDEX: usize;

    /// Metrics describing the work done to reach this stage. `None` for
    /// [`Pending`].
    fn metrics(&self) -> Option<StageMetrics>;

    /// Advance one stage. `Ok(None)` at the final stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the transition fails.
    fn next(self) -> Result<Option<Stage>, PipelineError>;

    /// Run every remaining stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any remaining fallible stage fails.
    fn complete(self) -> Result<StagedResult, PipelineError>;
}

impl PipelineStage for Pending {
    const NAME: &str = "source";
    const INDEX: usize = 0;

    fn metrics(&self) -> Option<StageMetrics> {
        None
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Thresholded(self.threshold()?)))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.threshold()?.complete()
    }
}

impl PipelineStage for Thresholded {
    const NAME: &str = "threshold";
    const INDEX: usize = 1;

    fn metrics(&self) -> Option<StageMetrics> {
        let dims = self.mask.dimensions();
        Some(StageMetrics::Threshold {
            threshold: self.config.threshold,
            hysteresis_low_threshold: self.config.hysteresis_low_threshold,
            foreground_pixels: self.mask.foreground_count(),
            total_pixels: u64::from(dims.width) * u64::from(dims.height),
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Skeletonized(self.skeletonize())))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.skeletonize().complete()
    }
}

impl PipelineStage for Skeletonized {
    const NAME: &str = "skeletonize";
    const INDEX: usize = 2;

    fn metrics(&self) -> Option<StageMetrics> {
        let skeleton_pixels = self.skeleton.pixel_count();
        Some(StageMetrics::Skeletonize {
            iterations: self.skeleton.iterations(),
            skeleton_pixels,
            removed_pixels: self.mask.foreground_count().saturating_sub(skeleton_pixels),
            components: crate::skeleton::component_count(self.skeleton.mask()),
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::GraphBuilt(self.build_graph())))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.build_graph().complete()
    }
}

impl PipelineStage for GraphBuilt {
    const NAME: &str = "graph";
    const INDEX: usize = 3;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Graph {
            nodes: self.graph.node_count(),
            edges: self.graph.edge_count(),
            endpoints: self.graph.count_kind(NodeKind::Endpoint),
            junctions: self.graph.count_kind(NodeKind::Junction),
            loops: self.graph.count_kind(NodeKind::LoopAnchor),
            isolated: self.graph.count_kind(NodeKind::Isolated),
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Extracted(self.extract())))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.extract().complete()
    }
}

impl PipelineStage for Extracted {
    const NAME: &str = "extract";
    const INDEX: usize = 4;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Extract {
            tolerance: self.config.simplify_tolerance_px,
            strokes: self.extraction.strokes.len(),
            merges: self.extraction.merges,
            dots: self.extraction.dots,
            points: self
                .extraction
                .strokes
                .iter()
                .map(|s| s.polyline.len())
                .sum(),
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Scored(self.score())))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.score().complete()
    }
}

impl PipelineStage for Scored {
    const NAME: &str = "score";
    const INDEX: usize = 5;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Score {
            aggregate: self.config.confidence_aggregate.to_string(),
            accepted: self.scoring.accepted.len(),
            dropped_short: self.scoring.dropped_short,
            dropped_low_confidence: self.scoring.dropped_low_confidence,
            mean_confidence: self.scoring.mean_confidence(),
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Serialized(self.serialize()?)))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.serialize()?.complete()
    }
}

impl PipelineStage for Serialized {
    const NAME: &str = "serialize";
    const INDEX: usize = 6;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Serialize {
            paths: self.drawing.len(),
            closed_paths: self.drawing.closed_count(),
            points: self.drawing.point_count(),
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(None)
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        Ok(self.into_result())
    }
}

/// Type-erased pipeline state, for driving the pipeline in a loop.
#[must_use]
pub enum Stage {
    /// See [`Pending`].
    Pending(Pending),
    /// See [`Thresholded`].
    Thresholded(Thresholded),
    /// See [`Skeletonized`].
    Skeletonized(Skeletonized),
    /// See [`GraphBuilt`].
    GraphBuilt(GraphBuilt),
    /// See [`Extracted`].
    Extracted(Extracted),
    /// See [`Scored`].
    Scored(Scored),
    /// See [`Serialized`].
    Serialized(Serialized),
}

/// Compile-time guard: adding a [`Stage`] variant breaks this match,
/// which is the reminder to bump [`STAGE_COUNT`].
#[allow(dead_code, clippy::match_same_arms)]
const fn _stage_count_guard(s: &Stage) {
    match s {
        Stage::Pending(_)
        | Stage::Thresholded(_)
        | Stage::Skeletonized(_)
        | Stage::GraphBuilt(_)
        | Stage::Extracted(_)
        | Stage::Scored(_)
        | Stage::Serialized(_) => {}
    }
}

/// Result of [`Stage::advance`].
#[must_use]
pub enum Advance {
    /// The pipeline moved to this stage.
    Next(Stage),
    /// Already at the final stage, returned unchanged.
    Complete(Stage),
}

macro_rules! delegate {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            Self::Pending(s) => s.$method($($arg),*),
            Self::Thresholded(s) => s.$method($($arg),*),
            Self::Skeletonized(s) => s.$method($($arg),*),
            Self::GraphBuilt(s) => s.$method($($arg),*),
            Self::Extracted(s) => s.$method($($arg),*),
            Self::Scored(s) => s.$method($($arg),*),
            Self::Serialized(s) => s.$method($($arg),*),
        }
    };
}

impl Stage {
    /// Name of the current stage.
    #[must_use]
    pub fn name(&self) -> &'static str {
        delegate!(self, name)
    }

    /// Zero-based index of the current stage.
    #[must_use]
    pub fn index(&self) -> usize {
        delegate!(self, index)
    }

    /// Metrics for the current stage; `None` before any processing.
    #[must_use]
    pub fn metrics(&self) -> Option<StageMetrics> {
        delegate!(self, metrics)
    }

    /// Whether the pipeline is at the final stage.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Serialized(_))
    }

    /// Advance one stage; `Ok(None)` consumes the final stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the transition fails.
    pub fn next(self) -> Result<Option<Self>, PipelineError> {
        delegate!(self, next)
    }

    /// Advance one stage, handing the final stage back unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the transition fails.
    pub fn advance(self) -> Result<Advance, PipelineError> {
        if self.is_complete() {
            return Ok(Advance::Complete(self));
        }
        match self.next()? {
            Some(next) => Ok(Advance::Next(next)),
            None => Err(PipelineError::Serialization(
                "pipeline ended before the final stage".to_owned(),
            )),
        }
    }

    /// Run every remaining stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any remaining fallible stage fails.
    pub fn complete(self) -> Result<StagedResult, PipelineError> {
        delegate!(self, complete)
    }
}

// `PipelineStage`'s associated constants aren't reachable through
// `self`, so the delegate macro goes through this helper.
trait StageMetadata {
    fn name(&self) -> &'static str;
    fn index(&self) -> usize;
}

impl<T: PipelineStage> StageMetadata for T {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn index(&self) -> usize {
        T::INDEX
    }
}

macro_rules! stage_from {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Stage {
                fn from(s: $variant) -> Self {
                    Self::$variant(s)
                }
            }
        )*
    };
}

stage_from!(Pending, Thresholded, Skeletonized, GraphBuilt, Extracted, Scored, Serialized);

// ───────────────────── Pipeline entry point ──────────────────────────

/// Entry point for the staged pipeline.
///
/// [`Pipeline::new`] stores the raster and config without doing any
/// work; chain stage methods (or convert to a [`Stage`] and loop) to
/// process.
pub struct Pipeline;

impl Pipeline {
    /// Start a pipeline over `raster`.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(raster: Raster, config: PipelineConfig) -> Pending {
        Pending {
            config,
            raster,
            offsets: None,
        }
    }
}
