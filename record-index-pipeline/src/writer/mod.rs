//! Index writer.
//!
//! Sends documents to the search engine either one at a time or, while a
//! bulk session is open, grouped by index type when the session ends. The
//! index and each type's field mapping are created lazily on the first
//! write that needs them.

mod buffer;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use record_index_repository::{SearchEngineClient, SearchError};
use record_index_shared::{Document, Stage, TypeMapping};
use tracing::{debug, error, info, instrument, warn};

use crate::document::DocumentBuilder;
use crate::errors::PipelineError;
use crate::schema::MappingOverrides;
use crate::store::{RecordStore, SearchableRecord, TypeDescriptor};
use buffer::BulkBuffer;

/// Configuration for the index writer.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Whether writes reach the search engine at all.
    pub enabled: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl WriterConfig {
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// What has been set up in the engine during this writer's lifetime.
#[derive(Debug, Default)]
struct Registry {
    index_ready: bool,
    /// Record types whose mapping is known to be registered.
    mapped: HashSet<String>,
}

/// Writes documents for live records into the search index.
///
/// A transport failure marks the cluster unreachable; every later write is
/// skipped until [`IndexWriter::reset_connection`] or a successful
/// [`IndexWriter::define`].
pub struct IndexWriter {
    client: Arc<dyn SearchEngineClient>,
    builder: DocumentBuilder,
    overrides: MappingOverrides,
    enabled: AtomicBool,
    connected: AtomicBool,
    buffer: Mutex<BulkBuffer>,
    registry: tokio::sync::Mutex<Registry>,
}

impl IndexWriter {
    pub fn new(
        client: Arc<dyn SearchEngineClient>,
        builder: DocumentBuilder,
        config: WriterConfig,
    ) -> Self {
        Self {
            client,
            builder,
            overrides: MappingOverrides::default(),
            enabled: AtomicBool::new(config.enabled),
            connected: AtomicBool::new(true),
            buffer: Mutex::new(BulkBuffer::default()),
            registry: tokio::sync::Mutex::new(Registry::default()),
        }
    }

    /// Use administrator-supplied mappings in place of derived ones.
    pub fn with_overrides(mut self, overrides: MappingOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn client(&self) -> &Arc<dyn SearchEngineClient> {
        &self.client
    }

    pub fn builder(&self) -> &DocumentBuilder {
        &self.builder
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        self.builder.store()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Clear the unreachable mark so writes are attempted again.
    pub fn reset_connection(&self) {
        if !self.connected.swap(true, Ordering::SeqCst) {
            info!("Resuming index writes");
        }
    }

    pub fn is_buffering(&self) -> bool {
        self.buffer.lock().is_buffering()
    }

    pub fn pending_count(&self) -> usize {
        self.buffer.lock().pending_count()
    }

    fn accepts_writes(&self) -> bool {
        self.is_enabled() && self.is_connected()
    }

    /// Build and write the document for `record` at `stage`.
    #[instrument(skip(self, record), fields(record_type = %record.record_type(), record_id = record.id(), stage = %stage))]
    pub async fn index(&self, record: &dyn SearchableRecord, stage: Stage) -> Result<(), PipelineError> {
        if !self.accepts_writes() {
            debug!("Index writes suspended, skipping record");
            return Ok(());
        }

        let document = self.builder.build(record, stage).await?;
        self.index_document(document).await
    }

    /// Write a prepared document, or buffer it while a bulk session is open.
    ///
    /// Transport failures and documents the engine refuses to parse are
    /// logged and swallowed. Other failures are returned.
    pub async fn index_document(&self, document: Document) -> Result<(), PipelineError> {
        if !self.accepts_writes() {
            debug!(doc_id = %document.id, "Index writes suspended, skipping document");
            return Ok(());
        }

        let offered = self.buffer.lock().offer(document);
        let Some(document) = offered else {
            return Ok(());
        };

        match self.send_document(&document).await {
            Ok(()) => {
                debug!(doc_id = %document.id, "Indexed document");
                Ok(())
            }
            Err(e) => match e.as_search() {
                Some(search) if search.is_transport() => {
                    self.mark_disconnected(search);
                    Ok(())
                }
                Some(search) if search.is_document_rejection() => {
                    warn!(doc_id = %document.id, error = %search, "Search engine rejected document");
                    Ok(())
                }
                _ => {
                    error!(doc_id = %document.id, error = %e, "Failed to index document");
                    Err(e)
                }
            },
        }
    }

    /// Open a bulk session. Later writes are held until [`IndexWriter::end_bulk`].
    pub fn start_bulk(&self) {
        self.buffer.lock().start();
        debug!("Bulk session started");
    }

    /// Close the bulk session and send what it collected, one request per
    /// index type.
    ///
    /// Buffering is off again whatever the outcome. A transport failure
    /// drops the rest of the session; any other failure is returned and the
    /// remaining index types are not attempted.
    #[instrument(skip(self))]
    pub async fn end_bulk(&self) -> Result<(), PipelineError> {
        let pending = self.buffer.lock().finish();
        let total: usize = pending.values().map(Vec::len).sum();

        if total == 0 {
            debug!("Bulk session closed with nothing to send");
            return Ok(());
        }
        if !self.accepts_writes() {
            warn!(count = total, "Index writes suspended, dropping buffered documents");
            return Ok(());
        }

        info!(count = total, index_types = pending.len(), "Sending buffered documents");

        for (index_type, documents) in pending {
            match self.send_batch(&index_type, &documents).await {
                Ok(()) => {
                    debug!(index_type = %index_type, count = documents.len(), "Bulk batch indexed");
                }
                Err(e) => match e.as_search() {
                    Some(search) if search.is_transport() => {
                        self.mark_disconnected(search);
                        return Ok(());
                    }
                    _ => {
                        error!(index_type = %index_type, error = %e, "Bulk indexing failed");
                        return Err(e);
                    }
                },
            }
        }

        Ok(())
    }

    /// Delete the document for `record` at `stage`.
    ///
    /// Returns whether a document was removed. Failures are logged, never
    /// returned.
    #[instrument(skip(self, record), fields(record_type = %record.record_type(), record_id = record.id(), stage = %stage))]
    pub async fn remove(&self, record: &dyn SearchableRecord, stage: Stage) -> bool {
        if !self.is_enabled() {
            return false;
        }

        let descriptor = match self.builder.descriptor(record) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                warn!(error = %e, "Cannot remove document");
                return false;
            }
        };
        let id = DocumentBuilder::document_id(&descriptor, record, stage);

        match self
            .client
            .delete_document(descriptor.index_type(), &id.to_string())
            .await
        {
            Ok(()) => {
                if let Err(e) = self.client.refresh().await {
                    warn!(error = %e, "Refresh after delete failed");
                }
                debug!(doc_id = %id, "Removed document");
                true
            }
            Err(e) if e.is_not_found() => {
                warn!(doc_id = %id, "Document to remove was not in the index");
                false
            }
            Err(e) => {
                warn!(doc_id = %id, error = %e, "Failed to remove document");
                false
            }
        }
    }

    /// Create the index if needed and register the mapping of every
    /// indexed type.
    ///
    /// A mapping the engine refuses is logged and skipped; it is retried on
    /// the first write of that type. Success clears the unreachable mark.
    #[instrument(skip(self))]
    pub async fn define(&self) -> Result<(), PipelineError> {
        let mut registry = self.registry.lock().await;

        if !self.client.index_exists().await? {
            info!("Creating search index");
            self.client.create_index().await?;
        }
        registry.index_ready = true;

        let mut outcomes: HashMap<String, bool> = HashMap::new();
        for descriptor in self.store().indexed_types() {
            let mapping = self.mapping_for(&descriptor);
            let defined = match outcomes.get(&mapping.doc_type) {
                Some(defined) => *defined,
                None => {
                    let defined = match self.client.put_mapping(&mapping).await {
                        Ok(()) => {
                            info!(
                                doc_type = %mapping.doc_type,
                                fields = mapping.properties.len(),
                                "Defined field mapping"
                            );
                            true
                        }
                        Err(e) if e.is_transport() => return Err(e.into()),
                        Err(e) => {
                            warn!(doc_type = %mapping.doc_type, error = %e, "Failed to define field mapping");
                            false
                        }
                    };
                    outcomes.insert(mapping.doc_type.clone(), defined);
                    defined
                }
            };
            if defined {
                registry.mapped.insert(descriptor.name.clone());
            }
        }
        drop(registry);

        for doc_type in self.overrides.doc_types() {
            if !outcomes.contains_key(doc_type) {
                warn!(doc_type = %doc_type, "Mapping override matches no indexed type");
            }
        }

        self.reset_connection();
        Ok(())
    }

    /// Drop the whole index and forget what was registered in it.
    #[instrument(skip(self))]
    pub async fn delete_index(&self) -> Result<(), PipelineError> {
        let mut registry = self.registry.lock().await;

        match self.client.delete_index().await {
            Ok(()) => info!("Deleted search index"),
            Err(e) if e.is_not_found() => debug!("Search index did not exist"),
            Err(e) => return Err(e.into()),
        }

        *registry = Registry::default();
        self.builder.mapper().clear_cache();
        Ok(())
    }

    /// Index one document, registering the index and mapping again once if
    /// the write finds the index gone.
    async fn send_document(&self, document: &Document) -> Result<(), PipelineError> {
        let record_type = &document.id.record_type;
        self.ensure_ready(record_type).await?;

        match self.client.index_document(document).await {
            Err(e) if e.is_index_missing() => {
                warn!(doc_id = %document.id, error = %e, "Search index missing, defining it again");
                self.forget_registrations().await;
                self.ensure_ready(record_type).await?;
                self.client.index_document(document).await?;
            }
            result => result?,
        }

        self.client.refresh().await?;
        Ok(())
    }

    async fn send_batch(&self, index_type: &str, documents: &[Document]) -> Result<(), PipelineError> {
        let record_types: BTreeSet<&str> = documents
            .iter()
            .map(|document| document.id.record_type.as_str())
            .collect();
        for record_type in record_types {
            self.ensure_ready(record_type).await?;
        }

        self.client.bulk_index(index_type, documents).await?;
        self.client.refresh().await?;
        Ok(())
    }

    /// Create the index and register the type's mapping, once each.
    ///
    /// The registry lock is held for the whole check so concurrent first
    /// writes of a type register it once.
    async fn ensure_ready(&self, record_type: &str) -> Result<(), PipelineError> {
        let mut registry = self.registry.lock().await;

        if !registry.index_ready {
            if !self.client.index_exists().await? {
                info!("Creating search index");
                self.client.create_index().await?;
            }
            registry.index_ready = true;
        }

        if registry.mapped.contains(record_type) {
            return Ok(());
        }

        let descriptor = self
            .store()
            .descriptor(record_type)
            .ok_or_else(|| PipelineError::unknown_type(record_type))?;
        let mapping = self.mapping_for(&descriptor);

        if !self.client.has_mapping(&mapping.doc_type).await? {
            self.client.put_mapping(&mapping).await?;
            info!(doc_type = %mapping.doc_type, "Registered field mapping");
        }
        registry.mapped.insert(record_type.to_string());
        Ok(())
    }

    async fn forget_registrations(&self) {
        *self.registry.lock().await = Registry::default();
    }

    fn mapping_for(&self, descriptor: &TypeDescriptor) -> TypeMapping {
        self.overrides
            .resolve(descriptor)
            .unwrap_or_else(|| self.builder.mapper().mapping_for(descriptor).as_ref().clone())
    }

    fn mark_disconnected(&self, error: &SearchError) {
        if self.connected.swap(false, Ordering::SeqCst) {
            error!(error = %error, "Search cluster unreachable, suspending index writes");
        }
    }
}
