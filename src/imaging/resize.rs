//! Geometric resampling to and from the model's working canvas
//!
//! The model takes a fixed square canvas, so inputs are stretched onto it and
//! the output is stretched back to the caller's geometry. Aspect ratio is not
//! preserved in between, and there is no cropping or padding.

use image::imageops::FilterType;
use image::DynamicImage;

use crate::error::{AppError, Result};

const FILTER: FilterType = FilterType::Lanczos3;

/// Width and height of an image, captured before any resampling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn square(side: u32) -> Self {
        Self::new(side, side)
    }

    pub fn of(image: &DynamicImage) -> Self {
        Self::new(image.width(), image.height())
    }
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Stretch an image onto the square working canvas
pub fn to_working(image: &DynamicImage, side: u32) -> Result<DynamicImage> {
    resize_exact(image, ImageSize::square(side))
}

/// Stretch a model output back to the caller's original size
pub fn to_original(image: &DynamicImage, original: ImageSize) -> Result<DynamicImage> {
    resize_exact(image, original)
}

fn resize_exact(image: &DynamicImage, target: ImageSize) -> Result<DynamicImage> {
    if target.width == 0 || target.height == 0 {
        return Err(AppError::Resize(format!("Invalid target size {}", target)));
    }
    if image.width() == 0 || image.height() == 0 {
        return Err(AppError::Resize("Source image is empty".to_string()));
    }
    if ImageSize::of(image) == target {
        return Ok(image.clone());
    }

    Ok(image.resize_exact(target.width, target.height, FILTER))
}
