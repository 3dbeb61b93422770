//! Confidence rasters from encoded images.
//!
//! A saved confidence map is usually an 8-bit grayscale image where
//! brighter means "more likely a line". Scanned drawings are the other
//! way round (dark ink on light paper), which is what `invert` is for.

use image::GrayImage;

use crate::raster::Raster;
use crate::types::{Dimensions, PipelineError};

/// Build a raster from a grayscale image, mapping `v` to `v / 255`
/// (or `1 - v / 255` when `invert` is set).
#[must_use]
pub fn raster_from_gray_image(image: &GrayImage, invert: bool) -> Raster {
    let dimensions = Dimensions::new(image.width(), image.height());
    Raster::from_fn(dimensions, |x, y| {
        let v = f32::from(image.get_pixel(x, y).0[0]) / 255.0;
        if invert { 1.0 - v } else { v }
    })
}

/// Decode PNG, JPEG, BMP or WebP bytes into a confidence raster.
///
/// Colour images are reduced to luminance first.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn raster_from_image_bytes(bytes: &[u8], invert: bool) -> Result<Raster, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }
    let gray = image::load_from_memory(bytes)?.to_luma8();
    tracing::debug!(width = gray.width(), height = gray.height(), invert, "decoded raster");
    Ok(raster_from_gray_image(&gray, invert))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Pixel;

    fn encode_png(image: &GrayImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::L8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn empty_input_returns_error() {
        assert!(matches!(
            raster_from_image_bytes(&[], false),
            Err(PipelineError::EmptyInput)
        ));
    }

    #[test]
    fn corrupt_bytes_return_decode_error() {
        assert!(matches!(
            raster_from_image_bytes(&[0xFF, 0xFE, 0x00, 0x01], false),
            Err(PipelineError::ImageDecode(_))
        ));
    }

    #[test]
    fn png_values_scale_to_unit_range() {
        let image = GrayImage::from_fn(3, 2, |x, _| image::Luma([[0, 51, 255][x as usize]]));
        let raster = raster_from_image_bytes(&encode_png(&image), false).unwrap();
        assert_eq!(raster.dimensions(), Dimensions::new(3, 2));
        assert!(raster.get(Pixel::new(0, 1)).abs() < 1e-6);
        assert!((raster.get(Pixel::new(1, 0)) - 0.2).abs() < 1e-6);
        assert!((raster.get(Pixel::new(2, 1)) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn invert_flips_values() {
        let image = GrayImage::from_fn(2, 1, |x, _| image::Luma([if x == 0 { 0 } else { 255 }]));
        let raster = raster_from_gray_image(&image, true);
        assert!((raster.get(Pixel::new(0, 0)) - 1.0).abs() < 1e-6);
        assert!(raster.get(Pixel::new(1, 0)).abs() < 1e-6);
    }
}
