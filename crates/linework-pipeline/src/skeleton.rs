//! Topology-preserving thinning of a binary mask to 1-pixel-wide strokes.
//!
//! Each iteration runs four directional sub-passes (north, south, east,
//! west). A sub-pass marks every removable pixel against an unchanged
//! snapshot of the grid and then clears them all at once, so the result
//! does not depend on scan order. A pixel is removable in a sub-pass when:
//!
//! 1. it is a border pixel on that side (its 4-neighbor there is
//!    background),
//! 2. it is *simple*: its 8-connectivity number is 1, so removing it
//!    neither splits a component, nor merges holes, nor deletes one,
//! 3. it is not a stroke tip: it has one neighbor, or two that touch each
//!    other (which keeps diagonal staircases from eroding from the end).
//!
//! Clearing only same-side border pixels in parallel cannot remove both
//! halves of a 2-pixel-wide bridge, which is what makes the parallel
//! deletion as safe as the per-pixel test. Iteration stops after a full
//! round removes nothing.

use image::Luma;
use imageproc::region_labelling::{Connectivity, connected_components};

use crate::raster::{BinaryMask, RING};
use crate::types::{Dimensions, Pixel};

/// A thinned mask: every foreground pixel lies on a 1-pixel-wide stroke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skeleton {
    mask: BinaryMask,
    iterations: usize,
}

impl Skeleton {
    /// The thinned mask.
    #[must_use]
    pub const fn mask(&self) -> &BinaryMask {
        &self.mask
    }

    /// Consume the skeleton and return its mask.
    #[must_use]
    pub fn into_mask(self) -> BinaryMask {
        self.mask
    }

    /// Skeleton dimensions (same as the input mask).
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.mask.dimensions()
    }

    /// Skeleton pixels in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = Pixel> + '_ {
        self.mask.foreground_pixels()
    }

    /// Number of skeleton pixels.
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.mask.foreground_count()
    }

    /// Number of full thinning rounds run, including the final one that
    /// removed nothing.
    #[must_use]
    pub const fn iterations(&self) -> usize {
        self.iterations
    }
}

#[derive(Debug, Clone, Copy)]
enum Side {
    North,
    South,
    East,
    West,
}

impl Side {
    const ALL: [Self; 4] = [Self::North, Self::South, Self::East, Self::West];

    /// Position of this side's 4-neighbor in [`RING`].
    const fn ring_index(self) -> usize {
        match self {
            Self::East => 0,
            Self::North => 2,
            Self::West => 4,
            Self::South => 6,
        }
    }
}

/// Thin `mask` until no pixel can be removed.
///
/// The result is a subset of `mask`, has the same number of 8-connected
/// components and the same Euler number, and is a fixed point:
/// thinning it again returns it unchanged. Isolated pixels survive.
#[must_use = "returns the skeleton"]
pub fn skeletonize(mask: &BinaryMask) -> Skeleton {
    let mut current = mask.clone();
    let mut iterations = 0;
    loop {
        iterations += 1;
        let mut changed = false;
        for side in Side::ALL {
            if let Some(next) = thin_side(&current, side) {
                current = next;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    Skeleton {
        mask: current,
        iterations,
    }
}

/// One parallel sub-pass. Returns `None` when nothing was removed.
fn thin_side(grid: &BinaryMask, side: Side) -> Option<BinaryMask> {
    let dims = grid.dimensions();
    let marked: Vec<usize> = grid
        .foreground_pixels()
        .filter(|&p| is_removable(&neighborhood(grid, p), side))
        .filter_map(|p| dims.index_of(p))
        .collect();
    if marked.is_empty() {
        return None;
    }
    let mut bits = grid.bits().to_vec();
    for i in marked {
        bits[i] = false;
    }
    Some(BinaryMask::from_bits(dims, bits))
}

/// The eight neighbors of `pixel` in [`RING`] order.
pub(crate) fn neighborhood(mask: &BinaryMask, pixel: Pixel) -> [bool; 8] {
    let (x, y) = (i64::from(pixel.x), i64::from(pixel.y));
    RING.map(|(dx, dy)| mask.is_set(x + dx, y + dy))
}

fn is_removable(ring: &[bool; 8], side: Side) -> bool {
    !ring[side.ring_index()] && !is_tip(ring) && connectivity_number(ring) == 1
}

/// Isolated pixels and stroke ends.
fn is_tip(ring: &[bool; 8]) -> bool {
    match ring.iter().filter(|&&b| b).count() {
        0 | 1 => true,
        2 => (0..8).any(|k| ring[k] && ring[(k + 1) % 8]),
        _ => false,
    }
}

/// Yokoi's 8-connectivity number: how many separate 8-connected
/// foreground runs the pixel touches, counted on the complement.
fn connectivity_number(ring: &[bool; 8]) -> usize {
    let bg = |k: usize| usize::from(!ring[k % 8]);
    [0, 2, 4, 6]
        .into_iter()
        .map(|k| bg(k) - bg(k) * bg(k + 1) * bg(k + 2))
        .sum()
}

/// Euler number (components minus holes) under 8-connectivity.
///
/// Counts 2x2 bit-quads over the mask padded by one background pixel.
#[must_use]
pub fn euler_number(mask: &BinaryMask) -> i64 {
    let dims = mask.dimensions();
    let (mut q1, mut q3, mut qd) = (0_i64, 0_i64, 0_i64);
    for y in -1..i64::from(dims.height) {
        for x in -1..i64::from(dims.width) {
            let a = mask.is_set(x, y);
            let b = mask.is_set(x + 1, y);
            let c = mask.is_set(x, y + 1);
            let d = mask.is_set(x + 1, y + 1);
            match [a, b, c, d].iter().filter(|&&v| v).count() {
                1 => q1 += 1,
                3 => q3 += 1,
                2 if (a && d) || (b && c) => qd += 1,
                _ => {}
            }
        }
    }
    (q1 - q3 - 2 * qd) / 4
}

/// Number of 8-connected foreground components.
#[must_use]
pub fn component_count(mask: &BinaryMask) -> usize {
    let labels = connected_components(&mask.to_gray_image(), Connectivity::Eight, Luma([0u8]));
    labels.pixels().map(|p| p.0[0]).max().unwrap_or(0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(dims: Dimensions, x0: u32, y0: u32, x1: u32, y1: u32) -> BinaryMask {
        BinaryMask::from_fn(dims, |x, y| (x0..x1).contains(&x) && (y0..y1).contains(&y))
    }

    fn topology(mask: &BinaryMask) -> (usize, i64) {
        (component_count(mask), euler_number(mask))
    }

    fn assert_thins_cleanly(mask: &BinaryMask) -> Skeleton {
        let skeleton = skeletonize(mask);
        assert!(skeleton.mask().is_subset_of(mask));
        assert_eq!(topology(skeleton.mask()), topology(mask));
        assert_eq!(skeletonize(skeleton.mask()).mask(), skeleton.mask());
        skeleton
    }

    #[test]
    fn euler_number_of_basic_shapes() {
        let dims = Dimensions::new(7, 7);
        assert_eq!(euler_number(&BinaryMask::empty(dims)), 0);
        assert_eq!(euler_number(&rect(dims, 1, 1, 4, 4)), 1);

        let ring = BinaryMask::from_fn(dims, |x, y| {
            (1..6).contains(&x) && (1..6).contains(&y) && !(x == 3 && y == 3)
        });
        assert_eq!(euler_number(&ring), 0);

        let diagonal = BinaryMask::from_pixels(dims, [Pixel::new(0, 0), Pixel::new(1, 1)]);
        assert_eq!(euler_number(&diagonal), 1);
        assert_eq!(component_count(&diagonal), 1);
    }

    #[test]
    fn component_count_separates_blobs() {
        let dims = Dimensions::new(10, 5);
        let mask = BinaryMask::from_fn(dims, |x, y| y < 3 && (x < 3 || x > 5));
        assert_eq!(component_count(&mask), 2);
    }

    #[test]
    fn thick_bar_thins_to_its_middle_row() {
        let dims = Dimensions::new(10, 3);
        let skeleton = assert_thins_cleanly(&rect(dims, 0, 0, 10, 3));
        let expected: Vec<Pixel> = (0..10).map(|x| Pixel::new(x, 1)).collect();
        assert_eq!(skeleton.pixels().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn one_pixel_line_is_a_fixed_point() {
        let dims = Dimensions::new(10, 3);
        let line = rect(dims, 0, 1, 10, 2);
        let skeleton = skeletonize(&line);
        assert_eq!(skeleton.mask(), &line);
        assert_eq!(skeleton.iterations(), 1);
    }

    #[test]
    fn diagonal_staircase_survives() {
        let dims = Dimensions::new(8, 8);
        let stairs = BinaryMask::from_fn(dims, |x, y| x == y || x == y + 1);
        let skeleton = assert_thins_cleanly(&stairs);
        assert!(skeleton.mask().contains(Pixel::new(0, 0)));
        assert!(skeleton.mask().contains(Pixel::new(7, 7)));
    }

    #[test]
    fn isolated_pixel_survives() {
        let dims = Dimensions::new(5, 5);
        let dot = BinaryMask::from_pixels(dims, [Pixel::new(2, 2)]);
        assert_eq!(skeletonize(&dot).mask(), &dot);
    }

    #[test]
    fn two_by_two_block_keeps_one_component() {
        let dims = Dimensions::new(4, 4);
        let skeleton = assert_thins_cleanly(&rect(dims, 1, 1, 3, 3));
        assert!(skeleton.pixel_count() >= 1);
        assert!(skeleton.pixel_count() < 4);
    }

    #[test]
    fn filled_square_thins_to_a_short_stroke() {
        let dims = Dimensions::new(7, 7);
        let skeleton = assert_thins_cleanly(&rect(dims, 1, 1, 6, 6));
        assert!(skeleton.pixel_count() <= 5);
    }

    #[test]
    fn annulus_keeps_its_hole() {
        let dims = Dimensions::new(11, 11);
        let annulus = BinaryMask::from_fn(dims, |x, y| {
            let outer = (1..10).contains(&x) && (1..10).contains(&y);
            let hole = (4..7).contains(&x) && (4..7).contains(&y);
            outer && !hole
        });
        let skeleton = assert_thins_cleanly(&annulus);
        assert_eq!(euler_number(skeleton.mask()), 0);
        assert!(!skeleton.mask().contains(Pixel::new(5, 5)));
    }

    #[test]
    fn thick_plus_stays_connected() {
        let dims = Dimensions::new(15, 15);
        let plus = BinaryMask::from_fn(dims, |x, y| (6..9).contains(&x) || (6..9).contains(&y));
        let skeleton = assert_thins_cleanly(&plus);
        for tip in [(7, 0), (7, 14), (0, 7), (14, 7)] {
            let near = skeleton
                .pixels()
                .any(|p| p.x.abs_diff(tip.0) <= 1 && p.y.abs_diff(tip.1) <= 1);
            assert!(near, "arm tip {tip:?} was eroded");
        }
    }

    #[test]
    fn separate_blobs_stay_separate() {
        let dims = Dimensions::new(20, 8);
        let mask = BinaryMask::from_fn(dims, |x, y| {
            let left = (1..4).contains(&y) && (1..8).contains(&x);
            let right = (4..7).contains(&y) && (11..19).contains(&x);
            left || right
        });
        let skeleton = assert_thins_cleanly(&mask);
        assert_eq!(component_count(skeleton.mask()), 2);
    }

    #[test]
    fn ring_order_neighbors_are_consecutive() {
        // E and NE touch, so a pixel with just those two is a stroke tip.
        let mut ring = [false; 8];
        ring[0] = true;
        ring[1] = true;
        assert!(is_tip(&ring));
        // E and W do not.
        let mut ring = [false; 8];
        ring[0] = true;
        ring[4] = true;
        assert!(!is_tip(&ring));
        assert_eq!(connectivity_number(&ring), 2);
    }

    #[test]
    fn empty_mask_is_empty_skeleton() {
        let skeleton = skeletonize(&BinaryMask::empty(Dimensions::new(6, 6)));
        assert_eq!(skeleton.pixel_count(), 0);
    }
}
