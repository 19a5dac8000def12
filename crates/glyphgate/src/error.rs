//! Error types for CAPTCHA rendering.

use thiserror::Error;

/// Errors raised by the rendering pipeline
#[derive(Debug, Error)]
pub enum CaptchaError {
    /// Dimensions, lengths or style overrides out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Alphabet has fewer distinct symbols than a sample requires
    #[error("Insufficient alphabet: {alphabet} has {available} distinct symbols, {requested} requested")]
    InsufficientAlphabet {
        alphabet: &'static str,
        requested: usize,
        available: usize,
    },

    /// The image codec rejected the surface or format
    #[error("Encoding failure: {0}")]
    EncodingFailure(String),

    /// Pixel buffer allocation or codec limits exceeded
    #[error("Resource exhaustion: {0}")]
    ResourceExhaustion(String),

    /// Font file could not be read, parsed or resolved
    #[error("Font error: {0}")]
    Font(String),
}

impl CaptchaError {
    /// Returns true if the error comes from the configuration rather than the environment
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfiguration(_) | Self::InsufficientAlphabet { .. } | Self::Font(_)
        )
    }

    /// Returns true if a fresh attempt may succeed.
    ///
    /// Generation is never retried internally; this only informs the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ResourceExhaustion(_))
    }
}

impl From<image::ImageError> for CaptchaError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Limits(limits) => Self::ResourceExhaustion(limits.to_string()),
            other => Self::EncodingFailure(other.to_string()),
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, CaptchaError>;
