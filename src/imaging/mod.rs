//! Image handling - base64 text codec and working-canvas resampling

pub mod base64;
pub mod codec;
pub mod resize;

pub use resize::ImageSize;
