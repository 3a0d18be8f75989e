//! # Record Index Shared
//!
//! Shared types for the record search index: versioning stages, search
//! documents and their identities, field mappings, and search request and
//! response shapes.

pub mod document;
pub mod fields;
pub mod mapping;
pub mod search;
pub mod stage;

pub use document::{Document, DocumentId, FieldMap};
pub use mapping::{FieldSpec, FieldType, TypeMapping};
pub use search::{QueryKind, SearchHit, SearchQuery, SearchResponse};
pub use stage::{ParseStageError, Stage};
