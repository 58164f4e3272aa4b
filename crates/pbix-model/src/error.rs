use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("unknown document slot: {0}")]
    UnknownSlot(String),
    #[error("unknown part kind: {0}")]
    UnknownPartKind(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
