//! One handle over the whole pipeline, including the record lifecycle
//! hooks an application calls after its own writes.

use std::sync::Arc;

use record_index_repository::SearchEngineClient;
use record_index_shared::{SearchQuery, Stage};
use tracing::debug;

use crate::errors::PipelineError;
use crate::reindex::{Progress, RefreshSummary, ReindexCoordinator, ReindexTask};
use crate::results::ResultList;
use crate::store::{RecordStore, SearchableRecord};
use crate::writer::IndexWriter;

pub struct SearchService {
    writer: Arc<IndexWriter>,
    coordinator: Arc<ReindexCoordinator>,
}

impl SearchService {
    pub fn new(writer: IndexWriter) -> Self {
        let writer = Arc::new(writer);
        let coordinator = Arc::new(ReindexCoordinator::new(writer.clone()));
        Self {
            writer,
            coordinator,
        }
    }

    pub fn writer(&self) -> &Arc<IndexWriter> {
        &self.writer
    }

    pub fn coordinator(&self) -> &Arc<ReindexCoordinator> {
        &self.coordinator
    }

    pub fn client(&self) -> &Arc<dyn SearchEngineClient> {
        self.writer.client()
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        self.writer.store()
    }

    pub fn task(&self) -> ReindexTask {
        ReindexTask::new(self.coordinator.clone())
    }

    pub async fn index(&self, record: &dyn SearchableRecord, stage: Stage) -> Result<(), PipelineError> {
        self.writer.index(record, stage).await
    }

    pub async fn remove(&self, record: &dyn SearchableRecord, stage: Stage) -> bool {
        self.writer.remove(record, stage).await
    }

    /// A lazily executed search over the index.
    pub fn search(&self, query: SearchQuery) -> ResultList {
        ResultList::new(self.client().clone(), self.store().clone(), query)
    }

    pub async fn define(&self) -> Result<(), PipelineError> {
        self.writer.define().await
    }

    pub async fn refresh_all(
        &self,
        progress: Option<Progress<'_>>,
    ) -> Result<RefreshSummary, PipelineError> {
        self.coordinator.refresh_all(progress).await
    }

    pub async fn refresh_subtree(
        &self,
        root_ids: &[u64],
        recursive: bool,
        base_type: &str,
    ) -> Result<usize, PipelineError> {
        self.coordinator
            .refresh_subtree(root_ids, recursive, base_type)
            .await
    }

    pub async fn health_check(&self) -> Result<bool, PipelineError> {
        Ok(self.client().health_check().await?)
    }

    /// A record was written at `stage`.
    pub async fn on_after_write(
        &self,
        record: &dyn SearchableRecord,
        stage: Stage,
    ) -> Result<(), PipelineError> {
        self.index(record, stage).await
    }

    /// A record was deleted from `stage`.
    pub async fn on_after_delete(&self, record: &dyn SearchableRecord, stage: Stage) -> bool {
        self.remove(record, stage).await
    }

    pub async fn on_after_publish(&self, record: &dyn SearchableRecord) -> Result<(), PipelineError> {
        self.index(record, Stage::Published).await
    }

    /// The published copy is gone; the draft document is rewritten so
    /// unversioned and shared fields stay current.
    pub async fn on_after_unpublish(
        &self,
        record: &dyn SearchableRecord,
    ) -> Result<(), PipelineError> {
        let removed = self.remove(record, Stage::Published).await;
        debug!(
            record_type = %record.record_type(),
            record_id = record.id(),
            removed,
            "Record unpublished"
        );
        self.index(record, Stage::Draft).await
    }
}
