//! # SnapKit Common
//!
//! Shared error type, logging setup, and capture configuration for the
//! SnapKit workspace.
//!
//! ## Features
//!
//! - Unified error type with per-category classification
//! - Logging configuration on top of `tracing-subscriber`
//! - Capture tuning (`CaptureConfig`) loadable from JSON and the environment

use thiserror::Error;

pub mod config;
pub mod logging;

pub use config::CaptureConfig;
pub use logging::{init_logging, LogConfig, LogFormat};

/// Unified error type for SnapKit applications.
#[derive(Error, Debug)]
pub enum SnapKitError {
    /// DOM-related errors (parsing, tree access).
    #[error("DOM error: {message}")]
    Dom {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Capture pipeline errors.
    #[error("Capture error: {message}")]
    Capture {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Image encoding/decoding errors.
    #[error("Codec error: {message}")]
    Codec {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration errors.
    #[error("Config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// I/O errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl SnapKitError {
    /// Create a DOM error.
    pub fn dom(message: impl Into<String>) -> Self {
        Self::Dom {
            message: message.into(),
            source: None,
        }
    }

    /// Create a DOM error with source.
    pub fn dom_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Dom {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a capture error.
    pub fn capture(message: impl Into<String>) -> Self {
        Self::Capture {
            message: message.into(),
            source: None,
        }
    }

    /// Create a capture error with source.
    pub fn capture_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Capture {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a codec error with source.
    pub fn codec_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Codec {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error with source.
    pub fn config_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            SnapKitError::Dom { .. } => "dom",
            SnapKitError::Capture { .. } => "capture",
            SnapKitError::Codec { .. } => "codec",
            SnapKitError::Config { .. } => "config",
            SnapKitError::Io(_) => "io",
            SnapKitError::Json(_) => "json",
            SnapKitError::InvalidArgument(_) => "invalid_argument",
        }
    }
}

/// Result type alias for SnapKit operations.
pub type Result<T> = std::result::Result<T, SnapKitError>;
