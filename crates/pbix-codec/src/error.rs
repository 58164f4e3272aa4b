//! Codec error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    /// The payload is in the declared wrapping but its content is invalid.
    #[error("malformed document in part '{part}': {reason}")]
    MalformedDocument { part: String, reason: String },

    /// The payload carries a framing this codec does not decode.
    #[error("part '{part}' uses an unsupported wrapping: {scheme}")]
    UnsupportedWrapping { part: String, scheme: &'static str },

    /// A document could not be serialized back to bytes.
    #[error("failed to encode part '{part}': {reason}")]
    Encode { part: String, reason: String },
}

impl CodecError {
    pub fn part(&self) -> &str {
        match self {
            Self::MalformedDocument { part, .. }
            | Self::UnsupportedWrapping { part, .. }
            | Self::Encode { part, .. } => part,
        }
    }

    pub(crate) fn malformed(part: &str, reason: impl Into<String>) -> Self {
        Self::MalformedDocument {
            part: part.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
