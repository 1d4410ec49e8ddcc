use std::io::Cursor;

use image::{imageops, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect as PixelRect;
use pageproof_core_types::{BandCapture, ViewportTile};
use tracing::{debug, warn};

use crate::errors::StitchError;
use crate::models::{StitchOptions, StitchedImage};

const SEPARATOR_COLOR: image::Rgba<u8> = image::Rgba([68, 68, 68, 255]);

/// Composites ordered tiles and band captures into one raster.
pub struct Stitcher {
    options: StitchOptions,
}

impl Default for Stitcher {
    fn default() -> Self {
        Self::new(StitchOptions::default())
    }
}

impl Stitcher {
    pub fn new(options: StitchOptions) -> Self {
        Self { options }
    }

    /// Stitch tiles into the final page raster. Single tile with no bands
    /// is returned unchanged.
    pub fn stitch(
        &self,
        tiles: &[ViewportTile],
        header: Option<&BandCapture>,
        footer: Option<&BandCapture>,
    ) -> Result<StitchedImage, StitchError> {
        let first = tiles.first().ok_or(StitchError::NoTiles)?;

        if tiles.len() == 1 && header.is_none() && footer.is_none() {
            let img = decode(&first.image_bytes)?;
            return Ok(StitchedImage {
                image_bytes: first.image_bytes.clone(),
                width: img.width(),
                height: img.height(),
            });
        }

        validate_order(tiles)?;

        let first_raster = decode(&first.image_bytes)?;
        let canvas_width = first_raster.width();
        // Physical resolution comes from the raster itself, not from what
        // the page claims; the first tile is authoritative.
        let dpr = canvas_width as f64 / first.width;
        let last = tiles.last().expect("tiles is non-empty");
        let canvas_height = ((last.scroll_offset_y + last.height) * dpr).round() as u32;

        if canvas_height > self.options.max_canvas_height_px {
            warn!(
                target: "tile-stitcher",
                canvas_height,
                ceiling = self.options.max_canvas_height_px,
                "stitched canvas exceeds the configured ceiling"
            );
        }

        let mut canvas =
            RgbaImage::from_pixel(canvas_width, canvas_height, image::Rgba([255, 255, 255, 255]));

        for (index, tile) in tiles.iter().enumerate() {
            let raster = if index == 0 {
                first_raster.clone()
            } else {
                decode(&tile.image_bytes)?
            };
            if raster.width() != canvas_width {
                return Err(StitchError::InvalidTiles(format!(
                    "tile {} raster width {} != {}",
                    index,
                    raster.width(),
                    canvas_width
                )));
            }

            let src_y = ((tile.crop_top * dpr).round() as u32).min(raster.height());
            let band_h = ((tile.height * dpr).round() as u32).min(raster.height() - src_y);
            let dest_y = (tile.scroll_offset_y * dpr).round() as i64;

            let band = imageops::crop_imm(&raster, 0, src_y, canvas_width, band_h).to_image();
            imageops::replace(&mut canvas, &band, 0, dest_y);
        }

        if let Some(band) = header {
            self.overlay_band(&mut canvas, band, 0)?;
            let separator_y = (band.logical_height * dpr).round() as i32;
            self.draw_separator(&mut canvas, separator_y);
        }
        if let Some(band) = footer {
            let band_h = (band.logical_height * dpr).round() as i64;
            let dest_y = canvas_height as i64 - band_h;
            self.overlay_band(&mut canvas, band, dest_y)?;
            self.draw_separator(
                &mut canvas,
                (dest_y - self.options.separator_px as i64) as i32,
            );
        }

        debug!(
            target: "tile-stitcher",
            tiles = tiles.len(),
            width = canvas_width,
            height = canvas_height,
            "stitched page raster"
        );

        let mut buf = Vec::new();
        canvas
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .map_err(|err| StitchError::Encode(err.to_string()))?;
        Ok(StitchedImage {
            image_bytes: buf,
            width: canvas_width,
            height: canvas_height,
        })
    }

    /// Alpha-blend a band raster onto the canvas at `dest_y`.
    fn overlay_band(
        &self,
        canvas: &mut RgbaImage,
        band: &BandCapture,
        dest_y: i64,
    ) -> Result<(), StitchError> {
        let raster = decode(&band.image_bytes)?;
        let alpha = self.options.band_alpha.clamp(0.0, 1.0);

        for (x, y, pixel) in raster.enumerate_pixels() {
            let cx = x as i64;
            let cy = dest_y + y as i64;
            if cx < 0 || cy < 0 || cx >= canvas.width() as i64 || cy >= canvas.height() as i64 {
                continue;
            }
            let dst = canvas.get_pixel_mut(cx as u32, cy as u32);
            let a = (pixel[3] as f64 / 255.0) * alpha;
            for channel in 0..3 {
                let blended = pixel[channel] as f64 * a + dst[channel] as f64 * (1.0 - a);
                dst[channel] = blended.round().clamp(0.0, 255.0) as u8;
            }
            dst[3] = 255;
        }
        Ok(())
    }

    fn draw_separator(&self, canvas: &mut RgbaImage, y: i32) {
        if self.options.separator_px == 0 || y < 0 || y >= canvas.height() as i32 {
            return;
        }
        let rect = PixelRect::at(0, y).of_size(canvas.width(), self.options.separator_px);
        draw_filled_rect_mut(canvas, rect, SEPARATOR_COLOR);
    }
}

fn decode(bytes: &[u8]) -> Result<RgbaImage, StitchError> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|err| StitchError::Decode(err.to_string()))
}

fn validate_order(tiles: &[ViewportTile]) -> Result<(), StitchError> {
    for pair in tiles.windows(2) {
        if pair[1].scroll_offset_y <= pair[0].scroll_offset_y {
            return Err(StitchError::InvalidTiles(format!(
                "offsets not strictly increasing: {} then {}",
                pair[0].scroll_offset_y, pair[1].scroll_offset_y
            )));
        }
    }
    Ok(())
}
