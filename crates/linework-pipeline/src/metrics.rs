//! Overlap scores between binary masks, for checking a drawing against
//! a ground-truth line mask.

use image::{GrayImage, Luma};
use imageproc::drawing::draw_line_segment_mut;
use serde::{Deserialize, Serialize};

use crate::drawing::VectorDrawing;
use crate::raster::BinaryMask;
use crate::types::PipelineError;

/// IoU and Dice for one prediction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlapScores {
    /// Intersection over union.
    pub iou: f64,
    /// Dice coefficient.
    pub dice: f64,
}

/// Intersection, union and summed foreground counts of two same-sized masks.
fn overlap_counts(
    truth: &BinaryMask,
    predicted: &BinaryMask,
) -> Result<(usize, usize, usize), PipelineError> {
    if truth.dimensions() != predicted.dimensions() {
        return Err(PipelineError::Shape(format!(
            "cannot compare {} mask with {} mask",
            truth.dimensions(),
            predicted.dimensions()
        )));
    }
    let (mut intersection, mut union) = (0, 0);
    for (&a, &b) in truth.bits().iter().zip(predicted.bits()) {
        intersection += usize::from(a && b);
        union += usize::from(a || b);
    }
    let total = truth.foreground_count() + predicted.foreground_count();
    Ok((intersection, union, total))
}

/// Intersection over union. Two empty masks agree perfectly (`1.0`).
///
/// # Errors
///
/// Returns [`PipelineError::Shape`] if the masks differ in size.
#[allow(clippy::cast_precision_loss)]
pub fn iou(truth: &BinaryMask, predicted: &BinaryMask) -> Result<f64, PipelineError> {
    let (intersection, union, _) = overlap_counts(truth, predicted)?;
    if union == 0 {
        return Ok(1.0);
    }
    Ok(intersection as f64 / union as f64)
}

/// Dice coefficient `2|A∩B| / (|A| + |B|)`. Two empty masks score `1.0`.
///
/// # Errors
///
/// Returns [`PipelineError::Shape`] if the masks differ in size.
#[allow(clippy::cast_precision_loss)]
pub fn dice(truth: &BinaryMask, predicted: &BinaryMask) -> Result<f64, PipelineError> {
    let (intersection, _, total) = overlap_counts(truth, predicted)?;
    if total == 0 {
        return Ok(1.0);
    }
    Ok(2.0 * intersection as f64 / total as f64)
}

/// Both scores at once.
///
/// # Errors
///
/// Returns [`PipelineError::Shape`] if the masks differ in size.
pub fn overlap(truth: &BinaryMask, predicted: &BinaryMask) -> Result<OverlapScores, PipelineError> {
    Ok(OverlapScores {
        iou: iou(truth, predicted)?,
        dice: dice(truth, predicted)?,
    })
}

/// Mean IoU and Dice over several pairs, or `None` for no pairs.
///
/// # Errors
///
/// Returns [`PipelineError::Shape`] for the first pair whose masks
/// differ in size.
#[allow(clippy::cast_precision_loss)]
pub fn mean_overlap<'a>(
    pairs: impl IntoIterator<Item = (&'a BinaryMask, &'a BinaryMask)>,
) -> Result<Option<OverlapScores>, PipelineError> {
    let (mut iou_sum, mut dice_sum, mut n) = (0.0, 0.0, 0usize);
    for (truth, predicted) in pairs {
        let scores = overlap(truth, predicted)?;
        iou_sum += scores.iou;
        dice_sum += scores.dice;
        n += 1;
    }
    Ok((n > 0).then(|| OverlapScores {
        iou: iou_sum / n as f64,
        dice: dice_sum / n as f64,
    }))
}

/// Draw every path of `drawing` as 1 px lines into a mask of the
/// drawing's dimensions.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn rasterize_drawing(drawing: &VectorDrawing) -> BinaryMask {
    let dims = drawing.dimensions;
    let mut canvas = GrayImage::new(dims.width, dims.height);
    let ink = Luma([255u8]);

    for polyline in drawing.polylines() {
        let points = polyline.points();
        if let [only] = points {
            let (x, y) = (only.x.round(), only.y.round());
            if x >= 0.0 && y >= 0.0 && x < f64::from(dims.width) && y < f64::from(dims.height) {
                canvas.put_pixel(x as u32, y as u32, ink);
            }
            continue;
        }
        for pair in points.windows(2) {
            draw_line_segment_mut(
                &mut canvas,
                (pair[0].x as f32, pair[0].y as f32),
                (pair[1].x as f32, pair[1].y as f32),
                ink,
            );
        }
    }

    BinaryMask::from_gray_image(&canvas)
}
