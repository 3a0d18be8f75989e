//! Administrative reindex entry points.

use std::sync::Arc;

use tracing::{error, info, instrument};

use super::{report, Progress, RefreshSummary, ReindexCoordinator};
use crate::errors::PipelineError;

/// Base type used by the item reindex when none is given.
pub const DEFAULT_BASE_TYPE: &str = "Page";

/// Options for [`ReindexTask::run`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReindexOptions {
    /// Delete the index before defining it again.
    pub rebuild: bool,
    /// Re-index every record after defining the index.
    pub reindex: bool,
}

/// Options for [`ReindexTask::run_items`].
#[derive(Debug, Clone)]
pub struct ReindexItemsOptions {
    pub ids: Vec<u64>,
    pub recursive: bool,
    pub base_type: String,
}

impl Default for ReindexItemsOptions {
    fn default() -> Self {
        Self {
            ids: Vec::new(),
            recursive: false,
            base_type: DEFAULT_BASE_TYPE.to_string(),
        }
    }
}

impl ReindexItemsOptions {
    /// Parse a comma separated id list, ignoring blanks and anything that
    /// is not a positive number.
    pub fn parse_ids(ids: &str) -> Vec<u64> {
        ids.split(',')
            .filter_map(|id| id.trim().parse::<u64>().ok())
            .filter(|id| *id > 0)
            .collect()
    }
}

/// (Re)define the index and optionally refill it.
pub struct ReindexTask {
    coordinator: Arc<ReindexCoordinator>,
}

impl ReindexTask {
    pub fn new(coordinator: Arc<ReindexCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Returns the refresh summary when a reindex ran.
    #[instrument(skip(self, progress))]
    pub async fn run(
        &self,
        options: ReindexOptions,
        progress: Option<Progress<'_>>,
    ) -> Result<Option<RefreshSummary>, PipelineError> {
        let writer = self.coordinator.writer();

        if options.rebuild {
            report(progress, || "Deleting the index".to_string());
            writer.delete_index().await?;
        }

        report(progress, || "Defining the mappings (if not already)".to_string());
        writer.define().await?;

        if !options.reindex {
            return Ok(None);
        }

        report(progress, || "Refreshing the index".to_string());
        match self.coordinator.refresh_all(progress).await {
            Ok(summary) => {
                report(progress, || {
                    format!(
                        "Indexed {} documents across {} types",
                        summary.documents, summary.types
                    )
                });
                Ok(Some(summary))
            }
            Err(e) => {
                error!(error = %e, "Reindex failed");
                report(progress, || format!("Some failures detected when indexing: {e}"));
                Err(e)
            }
        }
    }

    /// Re-index specific records, optionally with their descendants.
    #[instrument(skip(self, progress))]
    pub async fn run_items(
        &self,
        options: &ReindexItemsOptions,
        progress: Option<Progress<'_>>,
    ) -> Result<usize, PipelineError> {
        if options.ids.is_empty() {
            report(progress, || "No record ids given".to_string());
            return Ok(0);
        }

        report(progress, || {
            format!(
                "Reindexing {} {} record(s){}",
                options.ids.len(),
                options.base_type,
                if options.recursive { " and their descendants" } else { "" }
            )
        });

        let count = self
            .coordinator
            .refresh_subtree(&options.ids, options.recursive, &options.base_type)
            .await?;

        info!(count, "Item reindex complete");
        report(progress, || format!("Reindexed {count} documents"));
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentBuilder;
    use crate::schema::SchemaMapper;
    use crate::test_support::{fixture_store, MockSearchClient};
    use crate::writer::{IndexWriter, WriterConfig};
    use std::sync::atomic::Ordering;

    fn task(client: &Arc<MockSearchClient>) -> ReindexTask {
        let builder = DocumentBuilder::new(fixture_store(), Arc::new(SchemaMapper::new()));
        let writer = IndexWriter::new(client.clone(), builder, WriterConfig::default());
        ReindexTask::new(Arc::new(ReindexCoordinator::new(Arc::new(writer))))
    }

    #[tokio::test]
    async fn test_define_only() {
        let client = MockSearchClient::new();

        let summary = task(&client).run(ReindexOptions::default(), None).await.unwrap();

        assert!(summary.is_none());
        assert_eq!(MockSearchClient::count(&client.put_mapping_calls), 3);
        assert!(client.doc_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_rebuild_and_reindex() {
        let client = MockSearchClient::new();
        client.index_exists.store(true, Ordering::SeqCst);

        let options = ReindexOptions {
            rebuild: true,
            reindex: true,
        };
        let summary = task(&client).run(options, None).await.unwrap().unwrap();

        assert_eq!(MockSearchClient::count(&client.delete_index_calls), 1);
        assert_eq!(MockSearchClient::count(&client.create_index_calls), 1);
        assert_eq!(summary.documents, 8);
        assert_eq!(client.doc_ids().await.len(), 8);
    }

    #[tokio::test]
    async fn test_run_items() {
        let client = MockSearchClient::new();
        let options = ReindexItemsOptions {
            ids: ReindexItemsOptions::parse_ids("42, 1,,x"),
            ..Default::default()
        };

        let count = task(&client).run_items(&options, None).await.unwrap();

        assert_eq!(options.ids, vec![42, 1]);
        assert_eq!(count, 4);
    }

    #[tokio::test]
    async fn test_run_items_without_ids() {
        let client = MockSearchClient::new();

        let count = task(&client)
            .run_items(&ReindexItemsOptions::default(), None)
            .await
            .unwrap();

        assert_eq!(count, 0);
        assert_eq!(MockSearchClient::count(&client.index_calls), 0);
    }
}
