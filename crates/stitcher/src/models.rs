use serde::{Deserialize, Serialize};

/// Tuning knobs for composition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StitchOptions {
    /// Canvases taller than this log a warning but are not rejected.
    pub max_canvas_height_px: u32,
    /// Opacity applied to recomposed header/footer bands, making the
    /// composition visually auditable.
    pub band_alpha: f64,
    /// Separator line thickness between a band and the page body,
    /// physical pixels.
    pub separator_px: u32,
}

impl Default for StitchOptions {
    fn default() -> Self {
        Self {
            max_canvas_height_px: 16_384,
            band_alpha: 0.92,
            separator_px: 2,
        }
    }
}

/// Final stitched raster, PNG-encoded, physical-pixel dimensions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StitchedImage {
    #[serde(skip)]
    pub image_bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}
