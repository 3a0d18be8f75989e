//! Full and partial re-indexing passes.

mod task;

pub use task::{ReindexItemsOptions, ReindexOptions, ReindexTask, DEFAULT_BASE_TYPE};

use std::collections::HashSet;
use std::sync::Arc;

use record_index_shared::Stage;
use tracing::{info, instrument, warn};

use crate::errors::PipelineError;
use crate::store::{RecordRef, RecordStore, TypeDescriptor};
use crate::writer::IndexWriter;

/// Sink for human readable progress lines.
pub type Progress<'a> = &'a (dyn Fn(&str) + Send + Sync);

pub(crate) fn report(progress: Option<Progress<'_>>, message: impl FnOnce() -> String) {
    if let Some(progress) = progress {
        progress(&message());
    }
}

/// Outcome of a full refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub types: usize,
    pub documents: usize,
}

/// Drives the writer over many records. Passes never overlap.
pub struct ReindexCoordinator {
    writer: Arc<IndexWriter>,
    pass: tokio::sync::Mutex<()>,
}

impl ReindexCoordinator {
    pub fn new(writer: Arc<IndexWriter>) -> Self {
        Self {
            writer,
            pass: tokio::sync::Mutex::new(()),
        }
    }

    pub fn writer(&self) -> &Arc<IndexWriter> {
        &self.writer
    }

    fn store(&self) -> &Arc<dyn RecordStore> {
        self.writer.store()
    }

    /// Re-index every record of every indexed type, one bulk session per
    /// type.
    ///
    /// Draft copies are indexed for every type and published copies for
    /// versioned types. The session is always closed, so a store failure
    /// still flushes what was collected before it is returned.
    #[instrument(skip(self, progress))]
    pub async fn refresh_all(
        &self,
        progress: Option<Progress<'_>>,
    ) -> Result<RefreshSummary, PipelineError> {
        let _pass = self.pass.lock().await;
        let mut summary = RefreshSummary::default();

        for descriptor in self.store().indexed_types() {
            report(progress, || format!("Indexing items of type {}", descriptor.name));

            self.writer.start_bulk();
            let collected = self.collect_type(&descriptor, progress).await;
            let flushed = self.writer.end_bulk().await;

            let count = collected?;
            flushed?;

            info!(record_type = %descriptor.name, count, "Type re-indexed");
            summary.types += 1;
            summary.documents += count;
        }

        info!(types = summary.types, documents = summary.documents, "Full refresh complete");
        Ok(summary)
    }

    async fn collect_type(
        &self,
        descriptor: &TypeDescriptor,
        progress: Option<Progress<'_>>,
    ) -> Result<usize, PipelineError> {
        let mut count = 0;

        for record in self.store().list(&descriptor.name, Stage::Draft).await? {
            report(progress, || format!("Indexing {}", record.title()));
            self.writer.index(record.as_ref(), Stage::Draft).await?;
            count += 1;
        }

        if descriptor.versioned {
            for record in self.store().list(&descriptor.name, Stage::Published).await? {
                report(progress, || format!("Indexing published {}", record.title()));
                self.writer.index(record.as_ref(), Stage::Published).await?;
                count += 1;
            }
        }

        Ok(count)
    }

    /// Re-index the given records at every stage, and with `recursive`
    /// their descendants too.
    ///
    /// Records are looked up by `base_type`, which also matches subtypes.
    /// Ids missing at a stage are skipped. Each `(record, stage)` is written
    /// at most once per call. Writes are sent immediately.
    #[instrument(skip(self))]
    pub async fn refresh_subtree(
        &self,
        root_ids: &[u64],
        recursive: bool,
        base_type: &str,
    ) -> Result<usize, PipelineError> {
        let _pass = self.pass.lock().await;
        let mut visited: HashSet<(Stage, u64)> = HashSet::new();
        let mut count = 0;

        for &root_id in root_ids {
            if root_id == 0 {
                warn!("Skipping record id 0");
                continue;
            }
            for stage in Stage::ALL {
                let Some(root) = self.store().get_by_id(base_type, root_id, stage).await? else {
                    continue;
                };
                count += self
                    .index_tree(root, recursive, base_type, stage, &mut visited)
                    .await?;
            }
        }

        info!(count, "Subtree refresh complete");
        Ok(count)
    }

    async fn index_tree(
        &self,
        root: RecordRef,
        recursive: bool,
        base_type: &str,
        stage: Stage,
        visited: &mut HashSet<(Stage, u64)>,
    ) -> Result<usize, PipelineError> {
        let mut stack = vec![root];
        let mut count = 0;

        while let Some(record) = stack.pop() {
            if !visited.insert((stage, record.id())) {
                continue;
            }
            self.writer.index(record.as_ref(), stage).await?;
            count += 1;

            if recursive {
                let children = self
                    .store()
                    .children_of(base_type, record.id(), stage)
                    .await?;
                stack.extend(children.into_iter().rev());
            }
        }

        Ok(count)
    }
}
