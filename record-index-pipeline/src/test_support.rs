//! Test doubles shared by the pipeline's unit tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use record_index_repository::{SearchEngineClient, SearchError};
use record_index_shared::{Document, SearchHit, SearchQuery, SearchResponse, Stage, TypeMapping};
use tokio::sync::Mutex;

use crate::store::{MemoryRecord, MemoryRecordStore, TypeDescriptor};

/// How the mock fails its next write calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Failure {
    #[default]
    None,
    /// Transport failure: the cluster is unreachable.
    Connection,
    /// The engine refuses to parse a document.
    Rejected,
    /// Some items of a bulk request fail.
    Bulk,
    /// Any other index error.
    Index,
}

/// In-memory search engine that records every call.
#[derive(Default)]
pub(crate) struct MockSearchClient {
    pub documents: Mutex<BTreeMap<String, Document>>,
    pub mappings: Mutex<Vec<TypeMapping>>,
    pub scripted_hits: Mutex<Option<Vec<SearchHit>>>,
    pub failure: parking_lot::Mutex<Failure>,
    pub index_exists: AtomicBool,
    pub create_index_calls: AtomicUsize,
    pub delete_index_calls: AtomicUsize,
    pub put_mapping_calls: AtomicUsize,
    pub index_calls: AtomicUsize,
    pub bulk_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
}

impl MockSearchClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_with(&self, failure: Failure) {
        *self.failure.lock() = failure;
    }

    pub async fn script_hits(&self, hits: Vec<SearchHit>) {
        *self.scripted_hits.lock().await = Some(hits);
    }

    pub async fn doc_ids(&self) -> Vec<String> {
        self.documents.lock().await.keys().cloned().collect()
    }

    pub async fn mapped_types(&self) -> Vec<String> {
        self.mappings
            .lock()
            .await
            .iter()
            .map(|mapping| mapping.doc_type.clone())
            .collect()
    }

    /// Removes the index the way an operator would, behind the writer's back.
    pub async fn drop_index(&self) {
        self.index_exists.store(false, Ordering::SeqCst);
        self.documents.lock().await.clear();
        self.mappings.lock().await.clear();
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn check_write(&self, doc_id: &str) -> Result<(), SearchError> {
        match *self.failure.lock() {
            Failure::None => Ok(()),
            Failure::Connection => Err(SearchError::connection("connection refused")),
            Failure::Rejected => Err(SearchError::document_rejected(format!(
                "failed to parse field [Created] of {doc_id}"
            ))),
            Failure::Bulk => Err(SearchError::bulk_index("1 of 1 documents failed")),
            Failure::Index => Err(SearchError::index("index is read-only")),
        }
    }

    fn check_transport(&self) -> Result<(), SearchError> {
        match *self.failure.lock() {
            Failure::Connection => Err(SearchError::connection("connection refused")),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl SearchEngineClient for MockSearchClient {
    async fn index_exists(&self) -> Result<bool, SearchError> {
        self.check_transport()?;
        Ok(self.index_exists.load(Ordering::SeqCst))
    }

    async fn create_index(&self) -> Result<(), SearchError> {
        self.check_transport()?;
        self.create_index_calls.fetch_add(1, Ordering::SeqCst);
        self.index_exists.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_index(&self) -> Result<(), SearchError> {
        self.check_transport()?;
        self.delete_index_calls.fetch_add(1, Ordering::SeqCst);
        if !self.index_exists.swap(false, Ordering::SeqCst) {
            return Err(SearchError::not_found("index records"));
        }
        self.documents.lock().await.clear();
        self.mappings.lock().await.clear();
        Ok(())
    }

    async fn has_mapping(&self, doc_type: &str) -> Result<bool, SearchError> {
        self.check_transport()?;
        Ok(self
            .mappings
            .lock()
            .await
            .iter()
            .any(|mapping| mapping.doc_type == doc_type))
    }

    async fn put_mapping(&self, mapping: &TypeMapping) -> Result<(), SearchError> {
        self.check_transport()?;
        self.put_mapping_calls.fetch_add(1, Ordering::SeqCst);
        let mut mappings = self.mappings.lock().await;
        mappings.retain(|known| known.doc_type != mapping.doc_type);
        mappings.push(mapping.clone());
        Ok(())
    }

    async fn index_document(&self, document: &Document) -> Result<(), SearchError> {
        self.index_calls.fetch_add(1, Ordering::SeqCst);
        self.check_write(&document.doc_id())?;
        if !self.index_exists.load(Ordering::SeqCst) {
            return Err(SearchError::index_missing("records"));
        }
        self.documents
            .lock()
            .await
            .insert(document.doc_id(), document.clone());
        Ok(())
    }

    async fn bulk_index(&self, _doc_type: &str, documents: &[Document]) -> Result<(), SearchError> {
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(first) = documents.first() {
            self.check_write(&first.doc_id())?;
        }
        let mut stored = self.documents.lock().await;
        for document in documents {
            stored.insert(document.doc_id(), document.clone());
        }
        Ok(())
    }

    async fn delete_document(&self, _doc_type: &str, id: &str) -> Result<(), SearchError> {
        self.check_transport()?;
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        match self.documents.lock().await.remove(id) {
            Some(_) => Ok(()),
            None => Err(SearchError::not_found(format!("document {id}"))),
        }
    }

    async fn refresh(&self) -> Result<(), SearchError> {
        self.check_transport()?;
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Returns the scripted hits if any, otherwise every stored document.
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SearchError> {
        self.check_transport()?;
        self.search_calls.fetch_add(1, Ordering::SeqCst);

        let hits = match self.scripted_hits.lock().await.clone() {
            Some(hits) => hits,
            None => self
                .documents
                .lock()
                .await
                .values()
                .map(|document| SearchHit {
                    id: document.doc_id(),
                    score: Some(1.0),
                    source: document.source().as_object().cloned().unwrap_or_default(),
                })
                .collect(),
        };

        let total = hits.len() as u64;
        let from = query.from.unwrap_or(0);
        let size = query.size.unwrap_or(hits.len());
        Ok(SearchResponse {
            hits: hits.into_iter().skip(from).take(size).collect(),
            total,
            took_ms: 3,
            aggregations: query.aggregations.clone(),
        })
    }

    async fn health_check(&self) -> Result<bool, SearchError> {
        Ok(self.check_transport().is_ok())
    }
}

/// A small site: a page tree with versioned pages and articles plus
/// unversioned tags.
///
/// Draft and published copies exist for pages 1, 10 and article 42.
/// Article 43 is a draft-only child of page 10. Tag 7 is unversioned.
pub(crate) fn fixture_store() -> Arc<MemoryRecordStore> {
    let store = MemoryRecordStore::new();
    store.register_type(
        TypeDescriptor::new("Page")
            .with_ancestry(["Page"])
            .with_field("Title", "Varchar(255)")
            .with_field("Content", "HTMLText")
            .with_field("Sort", "Int")
            .versioned()
            .hierarchical(),
    );
    store.register_type(
        TypeDescriptor::new("Article")
            .with_base("Page")
            .with_ancestry(["Page", "Article"])
            .with_field("Title", "Varchar(255)")
            .with_field("Content", "HTMLText")
            .with_field("Rating", "Int")
            .versioned()
            .hierarchical(),
    );
    store.register_type(TypeDescriptor::new("Tag").with_field("Title", "Varchar(64)"));

    let records = [
        MemoryRecord::new("Page", 1).with_field("Title", "Home"),
        MemoryRecord::new("Page", 10)
            .with_parent(1)
            .with_field("Title", "Blog"),
        MemoryRecord::new("Article", 42)
            .with_parent(10)
            .with_field("Title", "Rust in production")
            .with_field("Rating", 5),
    ];
    for stage in Stage::ALL {
        for record in records.iter().cloned() {
            store.insert(record, stage).unwrap();
        }
    }

    store
        .insert(
            MemoryRecord::new("Article", 43)
                .with_parent(10)
                .with_field("Title", "Unreleased"),
            Stage::Draft,
        )
        .unwrap();
    store
        .insert(MemoryRecord::new("Tag", 7).with_field("Title", "rust"), Stage::Draft)
        .unwrap();

    Arc::new(store)
}
