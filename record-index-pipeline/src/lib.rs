//! # Record Index Pipeline
//!
//! This crate keeps a search index eventually consistent with a record
//! store and turns search hits back into live records.
//!
//! ## Architecture
//!
//! 1. **Schema mapping**: derives field mappings from a type's declared fields
//! 2. **Document building**: turns a `(record, stage)` pair into a search document
//! 3. **Index writer**: sends documents immediately or buffers them for bulk sends
//! 4. **Result hydration**: re-fetches live records for raw search hits
//! 5. **Reindex coordination**: full and subtree re-indexing across stages

pub mod document;
pub mod errors;
pub mod reindex;
pub mod results;
pub mod schema;
pub mod service;
pub mod store;
pub mod writer;

#[cfg(test)]
pub(crate) mod test_support;

pub use document::{DocumentBuilder, DocumentDecorator};
pub use errors::{PipelineError, StoreError};
pub use reindex::{
    Progress, RefreshSummary, ReindexCoordinator, ReindexItemsOptions, ReindexOptions,
    ReindexTask,
};
pub use results::{ResultList, SearchResult};
pub use schema::{MappingDecorator, MappingOverrides, SchemaMapper};
pub use service::SearchService;
pub use store::{
    MemoryRecord, MemoryRecordStore, RecordRef, RecordStore, SearchableRecord, StorageType,
    TypeDescriptor, VisibilityCheck,
};
pub use writer::{IndexWriter, WriterConfig};
