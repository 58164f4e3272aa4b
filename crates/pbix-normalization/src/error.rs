//! Error types for document parsing and rendering.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NormalizeError {
    /// JSON text could not be parsed or rendered.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// XML text could not be parsed or rendered.
    #[error("invalid XML at byte {position}: {message}")]
    Xml { position: u64, message: String },
}

impl NormalizeError {
    pub(crate) fn xml(position: u64, message: impl Into<String>) -> Self {
        Self::Xml {
            position,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, NormalizeError>;
