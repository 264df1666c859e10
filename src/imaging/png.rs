//! Lossless PNG encoding of colorized bitmaps

use image::{ImageFormat, ImageResult, RgbImage};
use std::io::Cursor;

/// Encode an RGB bitmap as PNG bytes
pub fn encode(bitmap: &RgbImage) -> ImageResult<Vec<u8>> {
    let mut buf = Vec::new();
    bitmap.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}
