//! Error handling for layerloop
//!
//! Only setup and control paths return errors. The real-time block path
//! clamps, ignores or degrades instead of failing.

use thiserror::Error;

/// Result type alias for layerloop operations
pub type Result<T> = std::result::Result<T, LooperError>;

/// Main error type for layerloop operations
#[derive(Error, Debug)]
pub enum LooperError {
    // Configuration Errors
    #[error("Invalid configuration for '{field}': {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Invalid parameter '{param}': got {value}, expected {expected}")]
    InvalidParameter {
        param: String,
        value: String,
        expected: String,
    },

    #[error("Layer {index} is out of range (layers are numbered 1-8)")]
    LayerOutOfRange { index: usize },

    // Persistence Errors
    #[error("Parameter blob could not be restored: {reason}")]
    Persistence { reason: String },

    #[error("Parameter blob checksum mismatch")]
    ChecksumMismatch,

    // Audio File Errors
    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Invalid audio: {reason}")]
    InvalidAudio { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

impl LooperError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            LooperError::InvalidConfig { .. } => "INVALID_CONFIG",
            LooperError::InvalidParameter { .. } => "INVALID_PARAMETER",
            LooperError::LayerOutOfRange { .. } => "LAYER_OUT_OF_RANGE",
            LooperError::Persistence { .. } => "PERSISTENCE_ERROR",
            LooperError::ChecksumMismatch => "CHECKSUM_MISMATCH",
            LooperError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            LooperError::InvalidAudio { .. } => "INVALID_AUDIO",
            LooperError::Io(_) => "IO_ERROR",
            LooperError::Serialization(_) => "SERIALIZATION_ERROR",
            LooperError::Wav(_) => "WAV_ERROR",
        }
    }

    /// Check if the caller can reasonably retry or fall back to defaults
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            LooperError::InvalidParameter { .. }
                | LooperError::LayerOutOfRange { .. }
                | LooperError::Persistence { .. }
                | LooperError::ChecksumMismatch
        )
    }

    pub(crate) fn config(field: &str, reason: impl Into<String>) -> Self {
        LooperError::InvalidConfig {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}
