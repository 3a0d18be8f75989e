//! Dependency initialization and wiring for the record indexer.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use super::IndexerConfig;
use crate::IndexingError;
use record_index_pipeline::{
    DocumentBuilder, IndexWriter, MappingOverrides, MemoryRecordStore, RecordStore,
    SchemaMapper, SearchService, WriterConfig,
};
use record_index_repository::{IndexConfig, OpenSearchClient, SearchEngineClient};

/// Container for all initialized dependencies.
pub struct Dependencies {
    pub config: IndexerConfig,
    /// The configured search service ready to use.
    pub service: SearchService,
}

impl Dependencies {
    /// Initialize all dependencies from environment variables.
    ///
    /// See [`IndexerConfig::from_env`] for the variables read.
    pub async fn new() -> Result<Self, IndexingError> {
        Self::from_config(IndexerConfig::from_env()?).await
    }

    /// Initialize all dependencies from an explicit configuration.
    ///
    /// Fails when the cluster is unreachable or unhealthy, or when the
    /// record export or mapping overrides cannot be read.
    pub async fn from_config(config: IndexerConfig) -> Result<Self, IndexingError> {
        info!(
            opensearch_url = %config.opensearch_url,
            index_name = %config.index_name,
            indexing_enabled = config.indexing_enabled,
            records_path = %config.records_path.display(),
            "Initializing dependencies"
        );

        let search_client =
            OpenSearchClient::new(&config.opensearch_url, IndexConfig::new(&config.index_name))
                .map_err(|e| {
                    IndexingError::config(format!("Failed to create OpenSearch client: {}", e))
                })?;

        let healthy = search_client
            .health_check()
            .await
            .map_err(|e| IndexingError::config(format!("OpenSearch health check failed: {}", e)))?;

        if !healthy {
            return Err(IndexingError::config("OpenSearch cluster is unhealthy"));
        }

        info!("OpenSearch connection verified");

        let store = load_records(&config.records_path)?;
        info!(
            types = store.indexed_types().len(),
            records = store.len(),
            "Record store loaded"
        );

        let overrides = match &config.mappings_path {
            Some(path) => load_overrides(path)?,
            None => MappingOverrides::default(),
        };

        let builder = DocumentBuilder::new(Arc::new(store), Arc::new(SchemaMapper::new()));
        let writer = IndexWriter::new(
            Arc::new(search_client),
            builder,
            WriterConfig::default().with_enabled(config.indexing_enabled),
        )
        .with_overrides(overrides);

        if !config.indexing_enabled {
            warn!("Search indexing is disabled, writes will not reach the cluster");
        }

        Ok(Self {
            config,
            service: SearchService::new(writer),
        })
    }
}

fn load_records(path: &Path) -> Result<MemoryRecordStore, IndexingError> {
    let data = fs::read_to_string(path).map_err(|e| {
        IndexingError::config(format!("Failed to read records from {}: {}", path.display(), e))
    })?;
    Ok(MemoryRecordStore::from_json(&data)?)
}

fn load_overrides(path: &Path) -> Result<MappingOverrides, IndexingError> {
    let data = fs::read_to_string(path)?;
    let overrides = MappingOverrides::from_json(&data).map_err(|e| {
        IndexingError::config(format!(
            "Invalid mapping overrides in {}: {}",
            path.display(),
            e
        ))
    })?;
    info!(path = %path.display(), "Loaded mapping overrides");
    Ok(overrides)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("record-index-{}-{}", std::process::id(), name));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_records() {
        let path = temp_file(
            "records.json",
            r#"{"types": [{"name": "Page"}], "records": [{"type": "Page", "id": 1}]}"#,
        );

        let store = load_records(&path).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.indexed_types()[0].name, "Page");

        fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_missing_records_file() {
        let result = load_records(Path::new("/nonexistent/records.json"));
        assert!(matches!(result, Err(IndexingError::ConfigError(_))));
    }

    #[test]
    fn test_load_overrides() {
        let path = temp_file("mappings.json", r#"{"Page": {"Title": {"type": "keyword"}}}"#);
        let overrides = load_overrides(&path).unwrap();
        assert!(overrides.contains("Page"));
        fs::remove_file(&path).unwrap();

        let path = temp_file("bad-mappings.json", r#"{"Page": 3}"#);
        assert!(matches!(load_overrides(&path), Err(IndexingError::ConfigError(_))));
        fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_cluster() {
        let config = IndexerConfig {
            opensearch_url: "http://127.0.0.1:1".to_string(),
            ..Default::default()
        };

        let result = Dependencies::from_config(config).await;
        assert!(matches!(result, Err(IndexingError::ConfigError(_))));
    }
}
