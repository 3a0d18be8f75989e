//! OpenSearch index configuration.
//!
//! Field mappings are not part of the index settings: each document type
//! sends its own mapping before its first document is written.

use serde_json::{json, Value};

/// Default name of the search index.
pub const DEFAULT_INDEX_NAME: &str = "records";

/// Default number of documents sent per bulk request.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 500;

/// Configuration of the index an [`OpenSearchClient`](super::OpenSearchClient) is bound to.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Index name.
    pub name: String,
    /// Number of primary shards.
    pub number_of_shards: u32,
    /// Number of replica shards.
    pub number_of_replicas: u32,
    /// Maximum number of documents per bulk request; larger batches are split.
    pub max_batch_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_INDEX_NAME.to_string(),
            number_of_shards: 1,
            number_of_replicas: 1,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }
}

impl IndexConfig {
    /// Create a config for the named index with default settings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the shard and replica counts.
    pub fn with_shards(mut self, shards: u32, replicas: u32) -> Self {
        self.number_of_shards = shards;
        self.number_of_replicas = replicas;
        self
    }

    /// Set the bulk request size.
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size.max(1);
        self
    }

    /// Documents per bulk request, never less than one.
    pub fn batch_size(&self) -> usize {
        self.max_batch_size.max(1)
    }

    /// Body of the index creation request.
    pub fn settings(&self) -> Value {
        json!({
            "settings": {
                "number_of_shards": self.number_of_shards,
                "number_of_replicas": self.number_of_replicas
            }
        })
    }
}
