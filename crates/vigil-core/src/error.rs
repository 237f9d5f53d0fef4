// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Vigil channel monitor.

use thiserror::Error;

/// The primary error type used across collaborator traits and engine operations.
///
/// No variant is fatal to the running process: the engine logs the error and
/// abandons the affected unit of work (one batch, one alert, one summary).
#[derive(Debug, Error)]
pub enum VigilError {
    /// Configuration errors (missing secrets, unparseable schedule values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Chat platform errors (request failure, `ok: false` responses, rate limiting).
    #[error("gateway error: {message}")]
    Gateway {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Classification or summarization service errors.
    #[error("inference error: {message}")]
    Inference {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An external service answered, but the answer could not be interpreted.
    #[error("malformed response: {message}")]
    MalformedResponse { message: String },

    /// Channel metadata could not be loaded.
    #[error("directory error: {0}")]
    Directory(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl VigilError {
    /// Shorthand for a gateway error without an underlying source.
    pub fn gateway(message: impl Into<String>) -> Self {
        Self::Gateway {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for an inference error without an underlying source.
    pub fn inference(message: impl Into<String>) -> Self {
        Self::Inference {
            message: message.into(),
            source: None,
        }
    }
}
