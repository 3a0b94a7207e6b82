use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Index store error: {0}")]
    IndexStore(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl SearchError {
    /// Whether the error came from a collaborator (embedder or index store)
    /// rather than from the request itself. Callers use this to tell
    /// "service unavailable" apart from "no match".
    #[inline]
    pub fn is_dependency_failure(&self) -> bool {
        matches!(
            self,
            Self::Embedding(_) | Self::IndexStore(_) | Self::CollectionNotFound(_) | Self::Timeout(_)
        )
    }
}

pub mod commands;
pub mod config;
pub mod database;
pub mod dataset;
pub mod embeddings;
pub mod provision;
pub mod search;
