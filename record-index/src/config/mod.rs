//! Environment configuration for the record indexer.

mod dependencies;

pub use dependencies::Dependencies;

use std::env;
use std::path::PathBuf;

use record_index_repository::opensearch::DEFAULT_INDEX_NAME;

use crate::IndexingError;

/// Default OpenSearch URL.
const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Default location of the record export backing the store.
const DEFAULT_RECORDS_PATH: &str = "records.json";

/// Settings read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexerConfig {
    pub opensearch_url: String,
    pub index_name: String,
    /// When false the writer accepts calls but never contacts the cluster.
    pub indexing_enabled: bool,
    /// Optional JSON file of mapping overrides keyed by type.
    pub mappings_path: Option<PathBuf>,
    pub records_path: PathBuf,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            opensearch_url: DEFAULT_OPENSEARCH_URL.to_string(),
            index_name: DEFAULT_INDEX_NAME.to_string(),
            indexing_enabled: true,
            mappings_path: None,
            records_path: PathBuf::from(DEFAULT_RECORDS_PATH),
        }
    }
}

impl IndexerConfig {
    /// Read the configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `SEARCH_INDEX_NAME`: Index name (default: records)
    /// - `SEARCH_INDEXING_ENABLED`: `true`/`false` (default: true)
    /// - `SEARCH_MAPPINGS_PATH`: Mapping overrides file (optional)
    /// - `RECORDS_PATH`: Record export file (default: records.json)
    pub fn from_env() -> Result<Self, IndexingError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, IndexingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let value = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let indexing_enabled = match value("SEARCH_INDEXING_ENABLED") {
            Some(flag) => parse_flag("SEARCH_INDEXING_ENABLED", &flag)?,
            None => defaults.indexing_enabled,
        };

        Ok(Self {
            opensearch_url: value("OPENSEARCH_URL").unwrap_or(defaults.opensearch_url),
            index_name: value("SEARCH_INDEX_NAME").unwrap_or(defaults.index_name),
            indexing_enabled,
            mappings_path: value("SEARCH_MAPPINGS_PATH").map(PathBuf::from),
            records_path: value("RECORDS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.records_path),
        })
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool, IndexingError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(IndexingError::config(format!(
            "{} must be true or false, got {:?}",
            name, other
        ))),
    }
}
