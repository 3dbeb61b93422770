use linework_pipeline::Dimensions;

/// Errors from rendering or parsing export formats.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The overlay canvas would have zero area.
    #[error("cannot render an overlay for a {0} raster")]
    EmptyCanvas(Dimensions),

    /// PNG encoding failed.
    #[error("failed to encode PNG: {0}")]
    PngEncode(String),

    /// The SVG document or a path's `d` attribute could not be read.
    #[error("failed to parse SVG: {0}")]
    SvgParse(String),
}
