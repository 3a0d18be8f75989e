//! Lazily executed searches whose hits are hydrated into live records.

use std::sync::Arc;

use record_index_repository::SearchEngineClient;
use record_index_shared::{fields, DocumentId, SearchHit, SearchQuery, SearchResponse, Stage};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, instrument, warn};

use crate::errors::PipelineError;
use crate::store::{MemoryRecord, RecordRef, RecordStore};

/// A live record matched by a search.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub record: RecordRef,
    /// Stage the record was fetched at.
    pub stage: Stage,
    pub score: Option<f64>,
}

/// A search that runs on first access and caches its response.
pub struct ResultList {
    client: Arc<dyn SearchEngineClient>,
    store: Arc<dyn RecordStore>,
    query: SearchQuery,
    response: OnceCell<SearchResponse>,
}

impl ResultList {
    pub fn new(
        client: Arc<dyn SearchEngineClient>,
        store: Arc<dyn RecordStore>,
        query: SearchQuery,
    ) -> Self {
        Self {
            client,
            store,
            query,
            response: OnceCell::new(),
        }
    }

    pub fn query(&self) -> &SearchQuery {
        &self.query
    }

    /// A new list over the same query restricted to one page.
    pub fn limit(&self, count: usize, offset: usize) -> ResultList {
        Self::new(
            self.client.clone(),
            self.store.clone(),
            self.query.clone().with_page(count, offset),
        )
    }

    /// The raw engine response, executing the search on first call.
    #[instrument(skip(self))]
    pub async fn result_set(&self) -> Result<&SearchResponse, PipelineError> {
        self.response
            .get_or_try_init(|| async {
                let response = self.client.search(&self.query).await?;
                debug!(hits = response.hits.len(), total = response.total, "Search executed");
                Ok::<_, PipelineError>(response)
            })
            .await
    }

    pub async fn total_hits(&self) -> Result<u64, PipelineError> {
        Ok(self.result_set().await?.total)
    }

    pub async fn took_ms(&self) -> Result<u64, PipelineError> {
        Ok(self.result_set().await?.took_ms)
    }

    pub async fn aggregations(&self) -> Result<Option<&Value>, PipelineError> {
        Ok(self.result_set().await?.aggregations.as_ref())
    }

    /// Document ids of the current page of hits.
    pub async fn hit_ids(&self) -> Result<Vec<String>, PipelineError> {
        Ok(self
            .result_set()
            .await?
            .hits
            .iter()
            .map(|hit| hit.id.clone())
            .collect())
    }

    /// Number of hits that hydrate into visible records.
    pub async fn len(&self) -> Result<usize, PipelineError> {
        Ok(self.to_records(true).await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool, PipelineError> {
        Ok(self.len().await? == 0)
    }

    /// Fetch the live record behind every hit, in hit order.
    ///
    /// Hits whose identity cannot be read, whose stage differs from the
    /// query's stage, or whose record no longer exists are skipped, as are
    /// records flagged out of search. A hit for a type the store does not
    /// know is returned as a record built from its stored fields. With
    /// `apply_visibility_filter`, records whose access check refuses are
    /// skipped too.
    #[instrument(skip(self))]
    pub async fn to_records(
        &self,
        apply_visibility_filter: bool,
    ) -> Result<Vec<SearchResult>, PipelineError> {
        let response = self.result_set().await?;
        let active_stage = self.query.stage;
        let mut results = Vec::with_capacity(response.hits.len());

        for hit in &response.hits {
            let Some(identity) = hit_identity(hit) else {
                warn!(doc_id = %hit.id, "Search hit has no usable record identity");
                continue;
            };

            let stage = identity.stage.or(active_stage).unwrap_or_default();
            if active_stage.is_some_and(|active| active != stage) {
                debug!(doc_id = %hit.id, "Search hit belongs to another stage");
                continue;
            }

            let Some(record) = self.hydrate(hit, &identity, stage).await else {
                continue;
            };

            if apply_visibility_filter {
                if let Some(check) = record.visibility() {
                    if !check.can_view() {
                        debug!(doc_id = %hit.id, "Record hidden by its access check");
                        continue;
                    }
                }
            }

            if !record.show_in_search() {
                debug!(doc_id = %hit.id, "Record excluded from search");
                continue;
            }

            results.push(SearchResult {
                record,
                stage,
                score: hit.score,
            });
        }

        Ok(results)
    }

    async fn hydrate(&self, hit: &SearchHit, identity: &DocumentId, stage: Stage) -> Option<RecordRef> {
        if self.store.descriptor(&identity.record_type).is_none() {
            debug!(doc_id = %hit.id, "Search hit of an unknown type, using its stored fields");
            return Some(Arc::new(MemoryRecord::from_source(
                identity.record_type.clone(),
                identity.record_id,
                &hit.source,
            )));
        }

        match self
            .store
            .get_by_id(&identity.record_type, identity.record_id, stage)
            .await
        {
            Ok(Some(record)) => Some(record),
            Ok(None) => {
                warn!(doc_id = %hit.id, stage = %stage, "Search hit no longer in the record store");
                None
            }
            Err(e) => {
                warn!(doc_id = %hit.id, error = %e, "Failed to load the record behind a search hit");
                None
            }
        }
    }
}

/// Record identity of a hit: type and id from the stored fields when
/// present, otherwise from the document id. The stage only comes from the
/// document id.
fn hit_identity(hit: &SearchHit) -> Option<DocumentId> {
    let parsed = DocumentId::parse(&hit.id);

    let record_type = hit
        .source
        .get(fields::CLASS_NAME)
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .or_else(|| parsed.as_ref().map(|id| id.record_type.clone()))?;

    let record_id = hit
        .source
        .get(fields::ID)
        .and_then(|value| {
            value
                .as_u64()
                .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
        })
        .or_else(|| parsed.as_ref().map(|id| id.record_id))
        .filter(|id| *id > 0)?;

    Some(DocumentId {
        record_type,
        record_id,
        stage: parsed.and_then(|id| id.stage),
    })
}
