//! Image stitcher
//!
//! Composes a discovered [`TileGrid`] into one page image. The tile host numbers rows
//! bottom-up while images are addressed top-down, so tile (c, r) lands at
//! `(c * w, (max_row - r) * h)`. Missing tiles stay white; a tile that fails to decode
//! is logged and skipped. A tile larger than the recorded tile size is cropped to its
//! cell.

use crate::models::TileGrid;
use image::{imageops, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

#[derive(Debug, Error)]
pub enum StitchError {
    #[error("tile grid is empty or has no tile dimensions")]
    NotStitchable,

    #[error("PNG encoding failed: {0}")]
    Encode(String),

    #[error("stitch task failed: {0}")]
    Task(String),
}

/// Compose the grid into a single RGB image (CPU-bound; call off the async runtime)
pub fn stitch(grid: &TileGrid) -> Result<RgbImage, StitchError> {
    let (canvas_width, canvas_height) = grid.canvas_size().ok_or(StitchError::NotStitchable)?;
    let (tile_width, tile_height) = grid.tile_size().ok_or(StitchError::NotStitchable)?;
    let max_row = grid.max_row().ok_or(StitchError::NotStitchable)?;

    info!(
        tiles = grid.len(),
        canvas_width, canvas_height, "Stitching tiles"
    );

    let mut canvas = RgbImage::from_pixel(canvas_width, canvas_height, BACKGROUND);
    let mut skipped = 0usize;

    for (coordinate, data) in grid.iter() {
        let decoded = data
            .load()
            .map_err(|e| e.to_string())
            .and_then(|bytes| image::load_from_memory(&bytes).map_err(|e| e.to_string()));

        let mut tile = match decoded {
            Ok(tile) => tile.to_rgb8(),
            Err(e) => {
                warn!(tile = %coordinate, error = %e, "Skipping undecodable tile");
                skipped += 1;
                continue;
            }
        };

        if tile.width() > tile_width || tile.height() > tile_height {
            debug!(
                tile = %coordinate,
                width = tile.width(),
                height = tile.height(),
                "Cropping oversized tile"
            );
            tile = imageops::crop_imm(
                &tile,
                0,
                0,
                tile_width.min(tile.width()),
                tile_height.min(tile.height()),
            )
            .to_image();
        }

        let x = i64::from(coordinate.column) * i64::from(tile_width);
        let y = i64::from(max_row - coordinate.row) * i64::from(tile_height);
        imageops::replace(&mut canvas, &tile, x, y);
    }

    debug!(skipped, "Stitching complete");
    Ok(canvas)
}

/// Serialize a stitched page as PNG
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, StitchError> {
    let mut buffer = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|e| StitchError::Encode(e.to_string()))?;
    Ok(buffer)
}

/// Stitch and encode on the blocking pool
#[instrument(skip(grid), fields(tiles = grid.len()))]
pub async fn stitch_to_png(grid: TileGrid) -> Result<Vec<u8>, StitchError> {
    tokio::task::spawn_blocking(move || {
        let image = stitch(&grid)?;
        encode_png(&image)
    })
    .await
    .map_err(|e| StitchError::Task(e.to_string()))?
}
