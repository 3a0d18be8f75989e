//! Search engine client trait definition.
//!
//! This module defines the abstract interface for search engine operations,
//! allowing for different backend implementations (OpenSearch, Elasticsearch,
//! in-memory fakes for tests).

use async_trait::async_trait;

use crate::errors::SearchError;
use record_index_shared::{Document, SearchQuery, SearchResponse, TypeMapping};

/// Abstract interface for search engine operations.
///
/// An implementation is bound to a single index. Implementations can be
/// swapped for different backends, which keeps the indexing core testable
/// without a running cluster.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync` to allow use across async tasks.
///
/// # Error Handling
///
/// Implementations must report an unreachable cluster as
/// [`SearchError::ConnectionError`], a document the engine failed to parse as
/// [`SearchError::DocumentRejected`], partial bulk failures as
/// [`SearchError::BulkIndexError`], and missing documents as
/// [`SearchError::NotFound`]. The writer depends on that classification.
#[async_trait]
pub trait SearchEngineClient: Send + Sync {
    /// Check whether the index exists.
    async fn index_exists(&self) -> Result<bool, SearchError>;

    /// Create the index with its settings.
    async fn create_index(&self) -> Result<(), SearchError>;

    /// Delete the index and everything in it.
    async fn delete_index(&self) -> Result<(), SearchError>;

    /// Check whether a mapping has been registered for a document type.
    async fn has_mapping(&self, doc_type: &str) -> Result<bool, SearchError>;

    /// Send a type mapping to the index.
    async fn put_mapping(&self, mapping: &TypeMapping) -> Result<(), SearchError>;

    /// Index a single document, replacing any document with the same id.
    async fn index_document(&self, document: &Document) -> Result<(), SearchError>;

    /// Index a batch of documents of one type in a single bulk request.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If all documents were indexed
    /// * `Err(SearchError::BulkIndexError)` - If any document failed
    async fn bulk_index(&self, doc_type: &str, documents: &[Document]) -> Result<(), SearchError>;

    /// Delete a document by id.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the document was deleted
    /// * `Err(SearchError::NotFound)` - If no such document exists
    async fn delete_document(&self, doc_type: &str, id: &str) -> Result<(), SearchError>;

    /// Make recent writes visible to search.
    async fn refresh(&self) -> Result<(), SearchError>;

    /// Execute a search query against the index.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let query = SearchQuery::text("annual report").in_stage(Stage::Published);
    /// let response = client.search(&query).await?;
    /// println!("Found {} results", response.total);
    /// ```
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SearchError>;

    /// Check if the search engine is healthy and reachable.
    async fn health_check(&self) -> Result<bool, SearchError>;
}
