use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("context store unavailable: {0}")]
    Unavailable(String),
    #[error("context store backend failure: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("failed to encode conversation context: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StorageError {
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(err))
    }
}

/// Why an inbound message was refused before it reached the dialogue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedInput {
    #[error("message is empty")]
    Empty,
    #[error("message has no readable text")]
    NoText,
    #[error("message is {len} characters, limit is {max}")]
    TooLong { len: usize, max: usize },
    #[error("message has no sender")]
    MissingSender,
}

#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Malformed(#[from] MalformedInput),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
