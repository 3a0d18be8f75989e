//! Builds search documents from live records.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::DateTime;
use record_index_shared::{fields, Document, DocumentId, FieldMap, FieldType, Stage};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::errors::PipelineError;
use crate::schema::SchemaMapper;
use crate::store::{RecordStore, SearchableRecord, TypeDescriptor};

/// Upper bound on the parent chain walked for `ParentsHierarchy`.
pub const MAX_ANCESTRY_DEPTH: usize = 64;

/// Hook that adjusts a document's fields before it is handed to the writer.
pub trait DocumentDecorator: Send + Sync {
    fn decorate(&self, record: &dyn SearchableRecord, stage: Stage, fields: &mut FieldMap);
}

impl<F> DocumentDecorator for F
where
    F: Fn(&dyn SearchableRecord, Stage, &mut FieldMap) + Send + Sync,
{
    fn decorate(&self, record: &dyn SearchableRecord, stage: Stage, fields: &mut FieldMap) {
        self(record, stage, fields)
    }
}

/// Turns `(record, stage)` pairs into [`Document`]s.
pub struct DocumentBuilder {
    store: Arc<dyn RecordStore>,
    mapper: Arc<SchemaMapper>,
    decorators: Vec<Arc<dyn DocumentDecorator>>,
}

impl DocumentBuilder {
    pub fn new(store: Arc<dyn RecordStore>, mapper: Arc<SchemaMapper>) -> Self {
        Self {
            store,
            mapper,
            decorators: Vec::new(),
        }
    }

    /// Register a decorator. Decorators run in registration order, after
    /// the built-in fields are filled.
    pub fn with_decorator(mut self, decorator: impl DocumentDecorator + 'static) -> Self {
        self.decorators.push(Arc::new(decorator));
        self
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn mapper(&self) -> &Arc<SchemaMapper> {
        &self.mapper
    }

    /// The record's descriptor, or an error for types the store does not know.
    pub fn descriptor(
        &self,
        record: &dyn SearchableRecord,
    ) -> Result<Arc<TypeDescriptor>, PipelineError> {
        self.store
            .descriptor(record.record_type())
            .ok_or_else(|| PipelineError::unknown_type(record.record_type()))
    }

    /// Identity of the document a record has at `stage`.
    ///
    /// Versioned types get one document per stage; other types share a
    /// single document across stages.
    pub fn document_id(
        descriptor: &TypeDescriptor,
        record: &dyn SearchableRecord,
        stage: Stage,
    ) -> DocumentId {
        if descriptor.versioned {
            DocumentId::new(record.record_type(), record.id(), stage)
        } else {
            DocumentId::unstaged(record.record_type(), record.id())
        }
    }

    /// Build the document for `record` at `stage`.
    pub async fn build(
        &self,
        record: &dyn SearchableRecord,
        stage: Stage,
    ) -> Result<Document, PipelineError> {
        let descriptor = self.descriptor(record)?;
        let mapping = self.mapper.mapping_for(&descriptor);

        let mut fields = FieldMap::new();
        for (name, spec) in &mapping.properties {
            let Some(value) = field_value(record, name) else {
                continue;
            };
            let value = match spec.field_type {
                Some(FieldType::Date) => normalize_date(value),
                _ => value,
            };
            fields.insert(name.clone(), value);
        }

        if descriptor.hierarchical || record.parent_id().is_some() {
            let parents = self
                .parent_chain(descriptor.index_type(), record, stage)
                .await?;
            fields.insert(fields::PARENTS_HIERARCHY.to_string(), json!(parents));
        }

        if !fields.contains_key(fields::CLASS_NAME_HIERARCHY) {
            let classes = if descriptor.ancestry.is_empty() {
                vec![record.record_type().to_string()]
            } else {
                descriptor.ancestry.clone()
            };
            fields.insert(fields::CLASS_NAME_HIERARCHY.to_string(), json!(classes));
        }

        for decorator in &self.decorators {
            decorator.decorate(record, stage, &mut fields);
        }

        let stages = if descriptor.versioned {
            vec![stage]
        } else {
            Stage::ALL.to_vec()
        };

        let document = Document {
            id: Self::document_id(&descriptor, record, stage),
            index_type: descriptor.index_type().to_string(),
            fields,
            stages,
        };
        debug!(doc_id = %document.id, fields = document.fields.len(), "Built document");
        Ok(document)
    }

    /// Ids of the record's ancestors, nearest first.
    ///
    /// Stops at a root, at a record already seen in the chain, or after
    /// [`MAX_ANCESTRY_DEPTH`] parents.
    async fn parent_chain(
        &self,
        base_type: &str,
        record: &dyn SearchableRecord,
        stage: Stage,
    ) -> Result<Vec<u64>, PipelineError> {
        let mut parents = Vec::new();
        let mut visited = HashSet::from([record.id()]);
        let mut next = record.parent_id();

        while let Some(parent_id) = next.filter(|id| *id > 0) {
            if !visited.insert(parent_id) {
                break;
            }
            if parents.len() == MAX_ANCESTRY_DEPTH {
                warn!(
                    record_type = %record.record_type(),
                    record_id = record.id(),
                    "Parent chain exceeds maximum depth, truncating"
                );
                break;
            }
            parents.push(parent_id);
            next = self.store.parent_id_of(base_type, parent_id, stage).await?;
        }

        Ok(parents)
    }
}

fn field_value(record: &dyn SearchableRecord, name: &str) -> Option<Value> {
    let value = match name {
        fields::ID => Some(json!(record.id())),
        fields::PARENT_ID => record.parent_id().map(|id| json!(id)),
        _ => record.field(name),
    };
    value.filter(|value| !value.is_null())
}

/// Rewrite RFC 3339 timestamps in the record store's date format.
fn normalize_date(value: Value) -> Value {
    match value.as_str().map(DateTime::parse_from_rfc3339) {
        Some(Ok(parsed)) => json!(fields::format_date(&parsed.naive_utc())),
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryRecord, MemoryRecordStore};
    use crate::test_support::fixture_store;

    fn builder(store: Arc<MemoryRecordStore>) -> DocumentBuilder {
        DocumentBuilder::new(store, Arc::new(SchemaMapper::new()))
    }

    #[tokio::test]
    async fn test_versioned_document() {
        let store = fixture_store();
        let article = store.get_by_id("Article", 42, Stage::Published).await.unwrap().unwrap();

        let document = builder(store)
            .build(article.as_ref(), Stage::Published)
            .await
            .unwrap();

        assert_eq!(document.doc_id(), "Article_42_published");
        assert_eq!(document.index_type, "Page");
        assert_eq!(document.stages, vec![Stage::Published]);
        assert_eq!(document.fields["ID"], json!(42));
        assert_eq!(document.fields["Title"], json!("Rust in production"));
        assert_eq!(document.fields["ParentID"], json!(10));
        assert_eq!(document.fields["ParentsHierarchy"], json!([10, 1]));
        assert_eq!(document.fields["ClassNameHierarchy"], json!(["Page", "Article"]));

        let source = document.source();
        assert_eq!(source["ClassName"], json!("Article"));
        assert_eq!(source["SS_Stage"], json!(["published"]));
    }

    #[tokio::test]
    async fn test_unversioned_document_covers_all_stages() {
        let store = fixture_store();
        let tag = store.get_by_id("Tag", 7, Stage::Draft).await.unwrap().unwrap();

        let document = builder(store).build(tag.as_ref(), Stage::Draft).await.unwrap();

        assert_eq!(document.doc_id(), "Tag_7");
        assert_eq!(document.stages, vec![Stage::Draft, Stage::Published]);
        assert_eq!(document.fields["ClassNameHierarchy"], json!(["Tag"]));
        assert!(!document.fields.contains_key("ParentsHierarchy"));
    }

    #[tokio::test]
    async fn test_null_fields_are_omitted() {
        let store = fixture_store();
        let record = MemoryRecord::new("Tag", 8).with_field("Title", Value::Null);

        let document = builder(store).build(&record, Stage::Draft).await.unwrap();

        assert!(!document.fields.contains_key("Title"));
        assert!(!document.fields.contains_key("ParentID"));
    }

    #[tokio::test]
    async fn test_self_parented_ancestor_stops_chain() {
        let store = fixture_store();
        store
            .insert(MemoryRecord::new("Page", 50).with_parent(50), Stage::Draft)
            .unwrap();
        let child = MemoryRecord::new("Page", 51).with_parent(50);

        let document = builder(store).build(&child, Stage::Draft).await.unwrap();
        assert_eq!(document.fields["ParentsHierarchy"], json!([50]));
    }

    #[tokio::test]
    async fn test_parent_cycle_terminates() {
        let store = fixture_store();
        store
            .insert(MemoryRecord::new("Page", 60).with_parent(61), Stage::Draft)
            .unwrap();
        store
            .insert(MemoryRecord::new("Page", 61).with_parent(60), Stage::Draft)
            .unwrap();
        let record = store.get_by_id("Page", 60, Stage::Draft).await.unwrap().unwrap();

        let document = builder(store).build(record.as_ref(), Stage::Draft).await.unwrap();
        assert_eq!(document.fields["ParentsHierarchy"], json!([61]));
    }

    #[tokio::test]
    async fn test_parent_chain_depth_is_bounded() {
        let store = fixture_store();
        for id in 100..300u64 {
            store
                .insert(MemoryRecord::new("Page", id).with_parent(id + 1), Stage::Draft)
                .unwrap();
        }
        let record = store.get_by_id("Page", 100, Stage::Draft).await.unwrap().unwrap();

        let document = builder(store).build(record.as_ref(), Stage::Draft).await.unwrap();
        let parents = document.fields["ParentsHierarchy"].as_array().unwrap().clone();
        assert_eq!(parents.len(), MAX_ANCESTRY_DEPTH);
        assert_eq!(parents[0], json!(101));
    }

    #[tokio::test]
    async fn test_decorators_and_date_normalization() {
        let store = fixture_store();
        let record = MemoryRecord::new("Tag", 9)
            .with_field("Title", "Async")
            .with_field("Created", "2024-03-01T10:15:00Z");

        let builder = builder(store).with_decorator(
            |record: &dyn SearchableRecord, stage: Stage, fields: &mut FieldMap| {
                fields.insert("Label".to_string(), json!(format!("{}:{}", record.title(), stage)));
            },
        );
        let document = builder.build(&record, Stage::Published).await.unwrap();

        assert_eq!(document.fields["Label"], json!("Async:published"));
        assert_eq!(document.fields["Created"], json!("2024-03-01 10:15:00"));
    }

    #[tokio::test]
    async fn test_unknown_type() {
        let store = fixture_store();
        let record = MemoryRecord::new("Ghost", 1);

        let result = builder(store).build(&record, Stage::Draft).await;
        assert!(matches!(result, Err(PipelineError::UnknownType(name)) if name == "Ghost"));
    }
}
