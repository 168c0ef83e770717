//! Error types for the watermarking library

use std::path::PathBuf;

/// Main error type for watermarking operations
#[derive(Debug, thiserror::Error)]
pub enum WatermarkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Cannot decode image {path}: {message}")]
    DecodeFailed { path: PathBuf, message: String },

    #[error("Cannot save image {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    #[error("Font not found: {family}")]
    FontNotFound { family: String },

    #[error("Invalid font file {path}")]
    InvalidFont { path: PathBuf },

    #[error("Invalid watermark profile '{name}': {reason}")]
    InvalidProfile { name: String, reason: String },

    #[error("Profile store error: {message}")]
    StoreError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Logging initialization failed: {message}")]
    LoggingError { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WatermarkError {
    /// Get the error type as a string for categorization
    pub fn error_type(&self) -> &'static str {
        match self {
            WatermarkError::Io(_) => "io_error",
            WatermarkError::Image(_) => "image_error",
            WatermarkError::DecodeFailed { .. } => "decode_failed",
            WatermarkError::SaveFailed { .. } => "save_failed",
            WatermarkError::FontNotFound { .. } => "font_not_found",
            WatermarkError::InvalidFont { .. } => "invalid_font",
            WatermarkError::InvalidProfile { .. } => "invalid_profile",
            WatermarkError::StoreError { .. } => "store_error",
            WatermarkError::ConfigError { .. } => "config_error",
            WatermarkError::LoggingError { .. } => "logging_error",
            WatermarkError::InvalidInput { .. } => "invalid_input",
            WatermarkError::Serialization(_) => "serialization_error",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, WatermarkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_types() {
        let error = WatermarkError::InvalidProfile {
            name: "Default".to_string(),
            reason: "empty text".to_string(),
        };
        assert_eq!(error.error_type(), "invalid_profile");
        assert_eq!(
            error.to_string(),
            "Invalid watermark profile 'Default': empty text"
        );

        let error = WatermarkError::SaveFailed {
            path: PathBuf::from("/tmp/out.png"),
            message: "disk full".to_string(),
        };
        assert_eq!(error.error_type(), "save_failed");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let error: WatermarkError = io.into();
        assert_eq!(error.error_type(), "io_error");
    }

    #[test]
    fn test_display_includes_context() {
        let error = WatermarkError::FontNotFound {
            family: "Nonexistent Sans".to_string(),
        };
        assert_eq!(error.to_string(), "Font not found: Nonexistent Sans");
    }
}
