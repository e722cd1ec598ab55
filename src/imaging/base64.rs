//! Base64 encoding and decoding utilities

use crate::error::{AppError, Result};
use base64::{engine::general_purpose::STANDARD, Engine};

/// Encode binary data to base64 string
pub fn encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decode base64 string to binary data
pub fn decode(encoded: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(strip_data_url(encoded))
        .map_err(|e| AppError::Decode(format!("Invalid base64 data: {}", e)))
}

// Handles the data URL form, e.g. "data:image/png;base64,..."
fn strip_data_url(data: &str) -> &str {
    let data = data.trim();
    if data.starts_with("data:") {
        data.split_once(',').map(|(_, payload)| payload).unwrap_or(data)
    } else {
        data
    }
}
