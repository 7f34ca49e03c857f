//! Encoded tile images for discovery and stitching tests

use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

/// Solid-colour PNG of the given size
pub fn solid_png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb(color));
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .expect("encode test tile");
    bytes.into_inner()
}

/// Default 8x6 grey tile
pub fn png_tile() -> Vec<u8> {
    solid_png(8, 6, [128, 128, 128])
}
