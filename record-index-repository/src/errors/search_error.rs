//! Search error types.
//!
//! This module defines the error types that can occur during search engine
//! operations. Callers branch on the variant: transport failures degrade the
//! writer, document rejections are skipped, bulk failures abort a reindex.

use thiserror::Error;

/// Errors that can occur during search engine operations.
#[derive(Error, Debug, Clone)]
pub enum SearchError {
    /// The search engine could not be reached.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The engine refused to parse a single document.
    #[error("Document rejected: {0}")]
    DocumentRejected(String),

    /// Bulk indexing operation had failures.
    #[error("Bulk index error: {0}")]
    BulkIndexError(String),

    /// The document or index does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Failed to index a single document.
    #[error("Index error: {0}")]
    IndexError(String),

    /// Failed to create or delete the search index.
    #[error("Index creation error: {0}")]
    IndexCreationError(String),

    /// Failed to read or write a type mapping.
    #[error("Mapping error: {0}")]
    MappingError(String),

    /// Search query execution failed.
    #[error("Query error: {0}")]
    QueryError(String),

    /// Failed to parse a response from the search engine.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The index, and with it every registered mapping, is gone.
    #[error("Index missing: {0}")]
    IndexMissing(String),
}

impl SearchError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a document rejected error.
    pub fn document_rejected(msg: impl Into<String>) -> Self {
        Self::DocumentRejected(msg.into())
    }

    /// Create a bulk index error.
    pub fn bulk_index(msg: impl Into<String>) -> Self {
        Self::BulkIndexError(msg.into())
    }

    /// Create a not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an index error.
    pub fn index(msg: impl Into<String>) -> Self {
        Self::IndexError(msg.into())
    }

    /// Create an index creation error.
    pub fn index_creation(msg: impl Into<String>) -> Self {
        Self::IndexCreationError(msg.into())
    }

    /// Create a mapping error.
    pub fn mapping(msg: impl Into<String>) -> Self {
        Self::MappingError(msg.into())
    }

    /// Create a query error.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::QueryError(msg.into())
    }

    /// Create an index missing error.
    pub fn index_missing(msg: impl Into<String>) -> Self {
        Self::IndexMissing(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Whether the error means the cluster is unreachable.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::ConnectionError(_))
    }

    /// Whether the engine rejected a single document it could not parse.
    pub fn is_document_rejection(&self) -> bool {
        matches!(self, Self::DocumentRejected(_))
    }

    /// Whether the error reports a missing document or index.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether a write found the index, and so its mappings, missing.
    pub fn is_index_missing(&self) -> bool {
        matches!(self, Self::IndexMissing(_))
    }
}
