//! Shared types for the linework vectorization pipeline.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// A 2D point in raster pixel coordinates.
///
/// Pixel `(x, y)` maps to the point `(x, y)`: integer coordinates name
/// pixel indices, not pixel corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

/// Integer coordinate of a single raster pixel.
///
/// Ordered row-major (by `y`, then `x`), which is the scan order used
/// everywhere a deterministic pixel order is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pixel {
    /// Column index.
    pub x: u32,
    /// Row index.
    pub y: u32,
}

impl Pixel {
    /// Create a new pixel coordinate.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// The pixel position as a floating-point [`Point`].
    #[must_use]
    pub fn to_point(self) -> Point {
        Point::new(f64::from(self.x), f64::from(self.y))
    }
}

impl Ord for Pixel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.y.cmp(&other.y).then(self.x.cmp(&other.x))
    }
}

impl PartialOrd for Pixel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A sequence of connected points forming a path segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline(Vec<Point>);

impl Polyline {
    /// Create a new polyline from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the polyline has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the polyline.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the first point, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Point> {
        self.0.first()
    }

    /// Returns the last point, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Point> {
        self.0.last()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Consumes the polyline and returns the underlying vector of points.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }

    /// Total arc length: the sum of all segment lengths.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.0.windows(2).map(|w| w[0].distance(w[1])).sum()
    }

    /// Whether the polyline forms a closed ring.
    ///
    /// A ring needs at least three points, with the first and last point
    /// no farther apart than `epsilon`.
    #[must_use]
    pub fn is_closed(&self, epsilon: f64) -> bool {
        match (self.0.len(), self.first(), self.last()) {
            (n, Some(first), Some(last)) if n >= 3 => first.distance(*last) <= epsilon,
            _ => false,
        }
    }
}

/// Raster dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create a new set of dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total number of pixels (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Row-major index of `pixel`, or `None` when it lies outside.
    #[must_use]
    pub const fn index_of(self, pixel: Pixel) -> Option<usize> {
        if pixel.x < self.width && pixel.y < self.height {
            Some(pixel.y as usize * self.width as usize + pixel.x as usize)
        } else {
            None
        }
    }

    /// Pixel coordinate for a row-major index.
    ///
    /// The caller must pass an index below [`pixel_count`](Self::pixel_count).
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn pixel_at(self, index: usize) -> Pixel {
        let width = self.width as usize;
        Pixel::new((index % width) as u32, (index / width) as u32)
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// How the raster values under a polyline are reduced to one confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceAggregate {
    /// Arithmetic mean of all values.
    #[default]
    Mean,
    /// Smallest value: one weak pixel condemns the whole stroke.
    Min,
    /// Mean after discarding [`TRIM_FRACTION`](crate::score::TRIM_FRACTION)
    /// of the sorted values from each end.
    TrimmedMean,
}

impl std::fmt::Display for ConfidenceAggregate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Mean => "mean",
            Self::Min => "min",
            Self::TrimmedMean => "trimmed_mean",
        };
        f.write_str(name)
    }
}

/// Configuration for the vectorization pipeline.
///
/// Every stage receives this struct by reference; nothing is read from
/// global state. Call [`validate`](Self::validate) (the pipeline does so
/// before touching any pixel) to reject inconsistent combinations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Binarization threshold in `(0, 1)`. Pixels at or above it are
    /// strong foreground.
    pub threshold: f32,

    /// Optional lower threshold for hysteresis. Pixels at or above it
    /// are kept only when 8-connected to a strong pixel.
    ///
    /// Must be strictly below `threshold`.
    pub hysteresis_low_threshold: Option<f32>,

    /// Ramer-Douglas-Peucker tolerance in pixels.
    pub simplify_tolerance_px: f64,

    /// Maximum deviation from straight continuation, in degrees, for two
    /// edges to be merged across a junction.
    pub merge_angle_tolerance_deg: f64,

    /// Polylines shorter than this (arc length, pixels) are dropped.
    pub min_length_px: f64,

    /// Polylines whose aggregated confidence falls below this are dropped.
    pub min_confidence: f32,

    /// How raster values under a polyline are aggregated.
    pub confidence_aggregate: ConfidenceAggregate,

    /// First/last point distance at or below which a polyline is emitted
    /// as a closed path.
    pub closed_path_epsilon_px: f64,

    /// Fail with [`PipelineError::Serialization`] instead of returning an
    /// empty drawing.
    pub strict: bool,

    /// Displace skeleton points by the offset field, when one is supplied.
    pub apply_offsets: bool,
}

impl PipelineConfig {
    /// Default binarization threshold.
    pub const DEFAULT_THRESHOLD: f32 = 0.5;
    /// Default RDP tolerance in pixels.
    pub const DEFAULT_SIMPLIFY_TOLERANCE_PX: f64 = 1.0;
    /// Default junction merge tolerance in degrees.
    pub const DEFAULT_MERGE_ANGLE_TOLERANCE_DEG: f64 = 15.0;
    /// Default minimum polyline length in pixels.
    pub const DEFAULT_MIN_LENGTH_PX: f64 = 2.0;
    /// Default minimum aggregated confidence (disabled).
    pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.0;
    /// Default closed-path epsilon in pixels.
    pub const DEFAULT_CLOSED_PATH_EPSILON_PX: f64 = 0.5;

    /// Check the configuration for invalid values and combinations.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] describing the first
    /// violated constraint.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "threshold must be in (0, 1), got {}",
                self.threshold
            )));
        }
        if let Some(low) = self.hysteresis_low_threshold
            && !(low > 0.0 && low < self.threshold)
        {
            return Err(PipelineError::InvalidConfig(format!(
                "hysteresis_low_threshold must be in (0, threshold={}), got {low}",
                self.threshold
            )));
        }
        let non_negative = [
            ("simplify_tolerance_px", self.simplify_tolerance_px),
            ("merge_angle_tolerance_deg", self.merge_angle_tolerance_deg),
            ("min_length_px", self.min_length_px),
            ("closed_path_epsilon_px", self.closed_path_epsilon_px),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(PipelineError::InvalidConfig(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        if self.merge_angle_tolerance_deg > 180.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "merge_angle_tolerance_deg must be at most 180, got {}",
                self.merge_angle_tolerance_deg
            )));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(PipelineError::InvalidConfig(format!(
                "min_confidence must be in [0, 1], got {}",
                self.min_confidence
            )));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            threshold: Self::DEFAULT_THRESHOLD,
            hysteresis_low_threshold: None,
            simplify_tolerance_px: Self::DEFAULT_SIMPLIFY_TOLERANCE_PX,
            merge_angle_tolerance_deg: Self::DEFAULT_MERGE_ANGLE_TOLERANCE_DEG,
            min_length_px: Self::DEFAULT_MIN_LENGTH_PX,
            min_confidence: Self::DEFAULT_MIN_CONFIDENCE,
            confidence_aggregate: ConfidenceAggregate::default(),
            closed_path_epsilon_px: Self::DEFAULT_CLOSED_PATH_EPSILON_PX,
            strict: false,
            apply_offsets: false,
        }
    }
}

/// Errors that can occur during pipeline processing.
///
/// Uses custom `Serialize`/`Deserialize` because `image::ImageError`
/// does not implement serde traits. The `ImageDecode` variant is
/// serialized as its `Display` string.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Raster data or an auxiliary field does not match the expected shape.
    #[error("shape mismatch: {0}")]
    Shape(String),

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// Strict mode is on and no polyline survived filtering.
    #[error("cannot serialize drawing: {0}")]
    Serialization(String),

    /// Failed to decode a confidence-map image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,
}

/// Serde-compatible proxy for `PipelineError`.
///
/// `image::ImageError` does not implement serde, so the `ImageDecode`
/// variant stores its `Display` string instead.
#[derive(Serialize, Deserialize)]
enum PipelineErrorProxy {
    Shape(String),
    InvalidConfig(String),
    Serialization(String),
    ImageDecode(String),
    EmptyInput,
}

impl Serialize for PipelineError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::Shape(s) => PipelineErrorProxy::Shape(s.clone()),
            Self::InvalidConfig(s) => PipelineErrorProxy::InvalidConfig(s.clone()),
            Self::Serialization(s) => PipelineErrorProxy::Serialization(s.clone()),
            Self::ImageDecode(e) => PipelineErrorProxy::ImageDecode(e.to_string()),
            Self::EmptyInput => PipelineErrorProxy::EmptyInput,
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PipelineError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = PipelineErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            PipelineErrorProxy::Shape(s) => Self::Shape(s),
            PipelineErrorProxy::InvalidConfig(s) => Self::InvalidConfig(s),
            PipelineErrorProxy::Serialization(s) => Self::Serialization(s),
            // The typed image error cannot be rebuilt; keep its message.
            PipelineErrorProxy::ImageDecode(msg) => {
                Self::InvalidConfig(format!("image decode error: {msg}"))
            }
            PipelineErrorProxy::EmptyInput => Self::EmptyInput,
        })
    }
}
