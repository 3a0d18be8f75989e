//! # Record Index Repository
//!
//! This crate provides the interface the indexing core uses to talk to the
//! search engine, the error taxonomy for those operations, and a concrete
//! implementation for OpenSearch.

pub mod errors;
pub mod interfaces;
pub mod opensearch;

pub use errors::SearchError;
pub use interfaces::SearchEngineClient;
pub use opensearch::{IndexConfig, OpenSearchClient};
