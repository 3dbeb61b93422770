//! Dense pixel grids: the confidence [`Raster`], its optional
//! [`OffsetField`], and the [`BinaryMask`] derived from them.
//!
//! All grids are row-major and immutable once built. Stages that
//! "change" a grid build a new one.

use image::{GrayImage, Luma};

use crate::types::{Dimensions, Pixel, PipelineError};

/// Offsets of the eight neighbors of a pixel, counter-clockwise from east
/// (in image coordinates, where `y` grows downward): E, NE, N, NW, W, SW,
/// S, SE. Consecutive entries are 4-adjacent to each other.
pub(crate) const RING: [(i64, i64); 8] = [
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Per-pixel confidence values in `[0, 1]` produced by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    dimensions: Dimensions,
    values: Vec<f32>,
}

impl Raster {
    /// Wrap row-major confidence values.
    ///
    /// Values are clamped to `[0, 1]`; NaN becomes `0.0`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Shape`] if `values.len()` is not
    /// `width * height`.
    pub fn try_new(dimensions: Dimensions, values: Vec<f32>) -> Result<Self, PipelineError> {
        if values.len() != dimensions.pixel_count() {
            return Err(PipelineError::Shape(format!(
                "raster {dimensions} needs {} values, got {}",
                dimensions.pixel_count(),
                values.len()
            )));
        }
        let values = values.into_iter().map(sanitize).collect();
        Ok(Self { dimensions, values })
    }

    /// Build a raster by evaluating `f(x, y)` for every pixel.
    #[must_use]
    pub fn from_fn(dimensions: Dimensions, mut f: impl FnMut(u32, u32) -> f32) -> Self {
        let mut values = Vec::with_capacity(dimensions.pixel_count());
        for y in 0..dimensions.height {
            for x in 0..dimensions.width {
                values.push(sanitize(f(x, y)));
            }
        }
        Self { dimensions, values }
    }

    /// An all-zero raster.
    #[must_use]
    pub fn zeros(dimensions: Dimensions) -> Self {
        Self {
            dimensions,
            values: vec![0.0; dimensions.pixel_count()],
        }
    }

    /// Raster dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Confidence at `pixel`, or `0.0` outside the raster.
    #[must_use]
    pub fn get(&self, pixel: Pixel) -> f32 {
        self.dimensions
            .index_of(pixel)
            .map_or(0.0, |i| self.values[i])
    }

    /// All values in row-major order.
    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Render the raster as an 8-bit grayscale image (`value * 255`).
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(self.dimensions.width, self.dimensions.height, |x, y| {
            let v = self.get(Pixel::new(x, y));
            Luma([(v * 255.0).round() as u8])
        })
    }
}

fn sanitize(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Predicted sub-pixel displacement of each pixel toward the true stroke
/// centerline, as `[dx, dy]` in pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct OffsetField {
    dimensions: Dimensions,
    offsets: Vec<[f32; 2]>,
}

impl OffsetField {
    /// Wrap row-major `[dx, dy]` offsets.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Shape`] if `offsets.len()` is not
    /// `width * height`.
    pub fn try_new(dimensions: Dimensions, offsets: Vec<[f32; 2]>) -> Result<Self, PipelineError> {
        if offsets.len() != dimensions.pixel_count() {
            return Err(PipelineError::Shape(format!(
                "offset field {dimensions} needs {} entries, got {}",
                dimensions.pixel_count(),
                offsets.len()
            )));
        }
        Ok(Self {
            dimensions,
            offsets,
        })
    }

    /// Field dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Offset at `pixel`, or `(0, 0)` outside the field.
    #[must_use]
    pub fn get(&self, pixel: Pixel) -> (f64, f64) {
        self.dimensions.index_of(pixel).map_or((0.0, 0.0), |i| {
            let [dx, dy] = self.offsets[i];
            (f64::from(dx), f64::from(dy))
        })
    }

    /// Check that this field lines up with `raster`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Shape`] on a dimension mismatch.
    pub fn check_matches(&self, raster: &Raster) -> Result<(), PipelineError> {
        if self.dimensions == raster.dimensions() {
            Ok(())
        } else {
            Err(PipelineError::Shape(format!(
                "offset field is {} but raster is {}",
                self.dimensions,
                raster.dimensions()
            )))
        }
    }
}

/// Foreground/background grid with the same dimensions as its raster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    dimensions: Dimensions,
    bits: Vec<bool>,
}

impl BinaryMask {
    /// An all-background mask.
    #[must_use]
    pub fn empty(dimensions: Dimensions) -> Self {
        Self {
            dimensions,
            bits: vec![false; dimensions.pixel_count()],
        }
    }

    /// Build a mask by evaluating `f(x, y)` for every pixel.
    #[must_use]
    pub fn from_fn(dimensions: Dimensions, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        let mut bits = Vec::with_capacity(dimensions.pixel_count());
        for y in 0..dimensions.height {
            for x in 0..dimensions.width {
                bits.push(f(x, y));
            }
        }
        Self { dimensions, bits }
    }

    /// Build a mask whose foreground is exactly `pixels`.
    ///
    /// Pixels outside `dimensions` are ignored.
    #[must_use]
    pub fn from_pixels(dimensions: Dimensions, pixels: impl IntoIterator<Item = Pixel>) -> Self {
        let mut bits = vec![false; dimensions.pixel_count()];
        for pixel in pixels {
            if let Some(i) = dimensions.index_of(pixel) {
                bits[i] = true;
            }
        }
        Self { dimensions, bits }
    }

    /// Treat every non-zero pixel of `image` as foreground.
    #[must_use]
    pub fn from_gray_image(image: &GrayImage) -> Self {
        let dimensions = Dimensions::new(image.width(), image.height());
        Self::from_fn(dimensions, |x, y| image.get_pixel(x, y).0[0] > 0)
    }

    pub(crate) const fn from_bits(dimensions: Dimensions, bits: Vec<bool>) -> Self {
        Self { dimensions, bits }
    }

    pub(crate) fn bits(&self) -> &[bool] {
        &self.bits
    }

    /// Mask dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Whether `pixel` is foreground. Outside the mask is background.
    #[must_use]
    pub fn contains(&self, pixel: Pixel) -> bool {
        self.dimensions.index_of(pixel).is_some_and(|i| self.bits[i])
    }

    /// Whether the signed position `(x, y)` is foreground.
    ///
    /// Negative or out-of-range coordinates read as background, which
    /// lets neighborhood code step off the border without special cases.
    #[must_use]
    pub fn is_set(&self, x: i64, y: i64) -> bool {
        match (u32::try_from(x), u32::try_from(y)) {
            (Ok(x), Ok(y)) => self.contains(Pixel::new(x, y)),
            _ => false,
        }
    }

    /// Number of foreground pixels.
    #[must_use]
    pub fn foreground_count(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    /// Returns `true` if no pixel is foreground.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.bits.iter().any(|&b| b)
    }

    /// Foreground pixels in row-major order.
    pub fn foreground_pixels(&self) -> impl Iterator<Item = Pixel> + '_ {
        let dims = self.dimensions;
        self.bits
            .iter()
            .enumerate()
            .filter(|&(_, &b)| b)
            .map(move |(i, _)| dims.pixel_at(i))
    }

    /// Whether every foreground pixel of `self` is foreground in `other`.
    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.dimensions == other.dimensions
            && self.bits.iter().zip(&other.bits).all(|(&a, &b)| !a || b)
    }

    /// Render as a grayscale image: 255 for foreground, 0 for background.
    #[must_use]
    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(self.dimensions.width, self.dimensions.height, |x, y| {
            Luma([if self.contains(Pixel::new(x, y)) { 255 } else { 0 }])
        })
    }
}
