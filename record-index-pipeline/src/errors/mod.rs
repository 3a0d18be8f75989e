//! Error types for the record index pipeline.

use record_index_repository::SearchError;
use thiserror::Error;

/// Errors reported by the record store collaborator.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// The store could not serve the request.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Record or type data could not be read.
    #[error("Invalid record data: {0}")]
    InvalidData(String),
}

impl StoreError {
    /// Create an unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create an invalid data error.
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }
}

/// Errors that can occur in the indexing pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Error from the search engine.
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// Error from the record store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The record store does not describe this type.
    #[error("Unknown record type: {0}")]
    UnknownType(String),
}

impl PipelineError {
    /// Create an unknown type error.
    pub fn unknown_type(record_type: impl Into<String>) -> Self {
        Self::UnknownType(record_type.into())
    }

    /// The underlying search error, if this is one.
    pub fn as_search(&self) -> Option<&SearchError> {
        match self {
            Self::Search(e) => Some(e),
            _ => None,
        }
    }
}
