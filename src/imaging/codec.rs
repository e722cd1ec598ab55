//! Conversion between base64 text and in-memory images

use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

use super::base64;
use crate::error::{AppError, Result};

/// Decode base64 image text (PNG or JPEG) into an RGB image.
///
/// A `data:image/...;base64,` prefix is accepted. Every decoded image is
/// normalized to 8-bit RGB so later stages see a single channel layout.
pub fn decode(text: &str) -> Result<DynamicImage> {
    let bytes = base64::decode(text)?;
    decode_bytes(&bytes)
}

/// Decode raw container bytes into an RGB image
pub fn decode_bytes(bytes: &[u8]) -> Result<DynamicImage> {
    let format = image::guess_format(bytes)
        .map_err(|e| AppError::Decode(format!("Unrecognized image data: {}", e)))?;

    if !matches!(format, ImageFormat::Png | ImageFormat::Jpeg) {
        return Err(AppError::Decode(format!(
            "Unsupported image format: {:?}",
            format
        )));
    }

    let image = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| AppError::Decode(e.to_string()))?;

    if image.width() == 0 || image.height() == 0 {
        return Err(AppError::Decode("Image has zero width or height".to_string()));
    }

    Ok(DynamicImage::ImageRgb8(image.to_rgb8()))
}

/// Encode an image as base64 PNG
pub fn encode(image: &DynamicImage) -> Result<String> {
    Ok(base64::encode(&encode_png(image)?))
}

/// Encode an image as PNG bytes
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| AppError::Encode(e.to_string()))?;
    Ok(bytes)
}
