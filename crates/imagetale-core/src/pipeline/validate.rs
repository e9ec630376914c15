//! Input validation before any remote call.

use crate::config::LimitsConfig;
use crate::error::{StageError, StageResult};
use crate::types::ImageInput;

/// Detect an image format from its leading bytes.
pub fn detect_format(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() < 4 {
        return None;
    }

    // JPEG: FF D8 FF
    if bytes[0] == 0xFF && bytes[1] == 0xD8 && bytes[2] == 0xFF {
        return Some("jpeg");
    }

    // PNG: 89 50 4E 47
    if bytes[0] == 0x89 && bytes[1] == b'P' && bytes[2] == b'N' && bytes[3] == b'G' {
        return Some("png");
    }

    // GIF: GIF8
    if bytes.starts_with(b"GIF8") {
        return Some("gif");
    }

    // WebP: RIFF....WEBP
    if bytes.starts_with(b"RIFF") && bytes.len() >= 12 && &bytes[8..12] == b"WEBP" {
        return Some("webp");
    }

    // BMP: BM
    if bytes[0] == b'B' && bytes[1] == b'M' {
        return Some("bmp");
    }

    None
}

/// Validates uploaded images against the configured limits.
pub struct Validator {
    limits: LimitsConfig,
}

impl Validator {
    /// Create a new validator with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Check an upload before it is saved or sent anywhere.
    ///
    /// Checks:
    /// - Image is not empty
    /// - Size is within limits
    /// - Magic bytes match a known image format
    /// - That format is in `limits.supported_formats`
    pub fn validate(&self, image: &ImageInput) -> StageResult<()> {
        if image.bytes.is_empty() {
            return Err(StageError::InvalidImage {
                file_name: image.file_name.clone(),
                message: "File is empty".to_string(),
            });
        }

        if image.bytes.len() as u64 > self.limits.max_image_bytes() {
            return Err(StageError::ImageTooLarge {
                file_name: image.file_name.clone(),
                size_mb: image.bytes.len() as u64 / (1024 * 1024),
                max_mb: self.limits.max_image_size_mb,
            });
        }

        let Some(format) = detect_format(&image.bytes) else {
            return Err(StageError::InvalidImage {
                file_name: image.file_name.clone(),
                message: "Unrecognized image format (invalid magic bytes)".to_string(),
            });
        };

        if !self.is_supported(format) {
            return Err(StageError::InvalidImage {
                file_name: image.file_name.clone(),
                message: format!(
                    "Format '{format}' not accepted (supported: {})",
                    self.limits.supported_formats.join(", ")
                ),
            });
        }

        Ok(())
    }

    fn is_supported(&self, format: &str) -> bool {
        self.limits.supported_formats.iter().any(|f| {
            let f = f.to_lowercase();
            f == format || (format == "jpeg" && f == "jpg")
        })
    }
}
