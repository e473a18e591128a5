//! Validation of user-uploaded images before any upstream submission.
//!
//! All checks run in order and fail fast: MIME type, byte size, then a
//! real decode to verify the payload is an image and measure its pixel
//! dimensions. A rejected upload must never reach the inference
//! service or the database.

use image::GenericImageView;

/// Maximum accepted upload size in bytes (10 MB).
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Minimum accepted width/height in pixels.
pub const MIN_DIMENSION: u32 = 64;

/// Maximum accepted width/height in pixels.
pub const MAX_DIMENSION: u32 = 4096;

/// Why an uploaded image was rejected.
#[derive(Debug, thiserror::Error)]
pub enum ImageValidationError {
    #[error("File must be an image")]
    NotAnImage,

    #[error("Image too large (max 10MB)")]
    TooManyBytes,

    #[error("Invalid image file: {0}")]
    Undecodable(String),

    #[error("Image too small (min {MIN_DIMENSION}x{MIN_DIMENSION} pixels)")]
    TooSmall,

    #[error("Image too large (max {MAX_DIMENSION}x{MAX_DIMENSION} pixels)")]
    TooBig,
}

/// Validated upload metadata returned on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
}

/// Validate an uploaded image: MIME type, byte size, decodability, and
/// pixel dimensions within [64x64, 4096x4096].
///
/// `content_type` is the MIME type as declared by the client for the
/// multipart field (e.g. `image/png`).
pub fn validate_upload(
    bytes: &[u8],
    content_type: &str,
) -> Result<ImageInfo, ImageValidationError> {
    if !content_type.starts_with("image/") {
        return Err(ImageValidationError::NotAnImage);
    }

    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(ImageValidationError::TooManyBytes);
    }

    let decoded = image::load_from_memory(bytes)
        .map_err(|e| ImageValidationError::Undecodable(e.to_string()))?;

    let (width, height) = decoded.dimensions();

    if width < MIN_DIMENSION || height < MIN_DIMENSION {
        return Err(ImageValidationError::TooSmall);
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(ImageValidationError::TooBig);
    }

    Ok(ImageInfo { width, height })
}
