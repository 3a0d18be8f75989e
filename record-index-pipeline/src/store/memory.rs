//! In-memory record store, loadable from a JSON export.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use record_index_shared::{fields, FieldMap, Stage};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{RecordRef, RecordStore, SearchableRecord, TypeDescriptor, VisibilityCheck};
use crate::errors::StoreError;

/// A plain record held by [`MemoryRecordStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    #[serde(rename = "type")]
    pub record_type: String,
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<u64>,
    #[serde(default)]
    pub fields: FieldMap,
    /// Access check result; records without one are always visible.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_view: Option<bool>,
}

impl MemoryRecord {
    pub fn new(record_type: impl Into<String>, id: u64) -> Self {
        Self {
            record_type: record_type.into(),
            id,
            parent_id: None,
            fields: FieldMap::new(),
            can_view: None,
        }
    }

    /// A record rebuilt from the fields stored in a search document.
    pub fn from_source(record_type: impl Into<String>, id: u64, source: &FieldMap) -> Self {
        Self {
            record_type: record_type.into(),
            id,
            parent_id: source.get(fields::PARENT_ID).and_then(Value::as_u64),
            fields: source.clone(),
            can_view: None,
        }
    }

    pub fn with_parent(mut self, parent_id: u64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_can_view(mut self, can_view: bool) -> Self {
        self.can_view = Some(can_view);
        self
    }
}

impl SearchableRecord for MemoryRecord {
    fn record_type(&self) -> &str {
        &self.record_type
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn parent_id(&self) -> Option<u64> {
        self.parent_id.filter(|id| *id > 0)
    }

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            fields::ID => Some(json!(self.id)),
            fields::PARENT_ID => self.parent_id().map(|id| json!(id)),
            _ => self.fields.get(name).filter(|value| !value.is_null()).cloned(),
        }
    }

    fn visibility(&self) -> Option<&dyn VisibilityCheck> {
        self.can_view.map(|_| self as &dyn VisibilityCheck)
    }
}

impl VisibilityCheck for MemoryRecord {
    fn can_view(&self) -> bool {
        self.can_view.unwrap_or(true)
    }
}

/// A record together with the stage it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedRecord {
    #[serde(default)]
    pub stage: Stage,
    #[serde(flatten)]
    pub record: MemoryRecord,
}

/// On-disk shape of a store export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordExport {
    #[serde(default)]
    pub types: Vec<TypeDescriptor>,
    #[serde(default)]
    pub records: Vec<StagedRecord>,
}

type RecordKey = (Stage, String, u64);

/// A [`RecordStore`] over records held in memory.
///
/// Records of non-versioned types have a single copy that is returned for
/// every stage.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    types: RwLock<Vec<Arc<TypeDescriptor>>>,
    records: RwLock<BTreeMap<RecordKey, Arc<MemoryRecord>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from an export. Records of undeclared types are
    /// rejected.
    pub fn from_export(export: RecordExport) -> Result<Self, StoreError> {
        let store = Self::new();
        for descriptor in export.types {
            store.register_type(descriptor);
        }
        for staged in export.records {
            store.insert(staged.record, staged.stage)?;
        }
        Ok(store)
    }

    pub fn from_json(data: &str) -> Result<Self, StoreError> {
        let export: RecordExport = serde_json::from_str(data)
            .map_err(|e| StoreError::invalid_data(format!("Failed to parse record export: {e}")))?;
        Self::from_export(export)
    }

    /// Add or replace a type description.
    pub fn register_type(&self, descriptor: TypeDescriptor) {
        let mut types = self.types.write();
        match types.iter_mut().find(|known| known.name == descriptor.name) {
            Some(known) => *known = Arc::new(descriptor),
            None => types.push(Arc::new(descriptor)),
        }
    }

    /// Add or replace a record at a stage.
    pub fn insert(&self, record: MemoryRecord, stage: Stage) -> Result<(), StoreError> {
        let descriptor = self.descriptor(&record.record_type).ok_or_else(|| {
            StoreError::invalid_data(format!("Undeclared record type {}", record.record_type))
        })?;
        let key = (
            storage_stage(&descriptor, stage),
            record.record_type.clone(),
            record.id,
        );
        self.records.write().insert(key, Arc::new(record));
        Ok(())
    }

    /// Drop a record from a stage, returning whether it existed.
    pub fn remove(&self, record_type: &str, id: u64, stage: Stage) -> bool {
        let Some(descriptor) = self.descriptor(record_type) else {
            return false;
        };
        let key = (storage_stage(&descriptor, stage), record_type.to_string(), id);
        self.records.write().remove(&key).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Records at `stage` matching a type filter, in key order.
    fn select<F>(&self, stage: Stage, mut matches: F) -> Vec<RecordRef>
    where
        F: FnMut(&TypeDescriptor, &MemoryRecord) -> bool,
    {
        let types = self.types.read();
        let records = self.records.read();

        records
            .iter()
            .filter_map(|((stored_stage, record_type, _), record)| {
                let descriptor = types.iter().find(|known| &known.name == record_type)?;
                if *stored_stage != storage_stage(descriptor, stage) {
                    return None;
                }
                matches(descriptor.as_ref(), record.as_ref()).then(|| record.clone() as RecordRef)
            })
            .collect()
    }
}

/// Stage under which a record of this type is kept.
fn storage_stage(descriptor: &TypeDescriptor, stage: Stage) -> Stage {
    if descriptor.versioned {
        stage
    } else {
        Stage::Draft
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    fn indexed_types(&self) -> Vec<Arc<TypeDescriptor>> {
        self.types.read().clone()
    }

    fn descriptor(&self, record_type: &str) -> Option<Arc<TypeDescriptor>> {
        self.types
            .read()
            .iter()
            .find(|known| known.name == record_type)
            .cloned()
    }

    async fn get_by_id(
        &self,
        record_type: &str,
        id: u64,
        stage: Stage,
    ) -> Result<Option<RecordRef>, StoreError> {
        Ok(self
            .select(stage, |descriptor, record| {
                record.id == id && descriptor.is_a(record_type)
            })
            .into_iter()
            .next())
    }

    async fn list(&self, record_type: &str, stage: Stage) -> Result<Vec<RecordRef>, StoreError> {
        Ok(self.select(stage, |descriptor, _| descriptor.name == record_type))
    }

    async fn children_of(
        &self,
        base_type: &str,
        parent_id: u64,
        stage: Stage,
    ) -> Result<Vec<RecordRef>, StoreError> {
        let mut children = self.select(stage, |descriptor, record| {
            record.parent_id() == Some(parent_id) && descriptor.is_a(base_type)
        });
        children.sort_by_key(|child| child.id());
        Ok(children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryRecordStore {
        MemoryRecordStore::from_json(
            r#"{
                "types": [
                    {"name": "Page", "versioned": true, "hierarchical": true,
                     "fields": {"Title": "Varchar(255)"}},
                    {"name": "Article", "base_type": "Page", "ancestry": ["Page", "Article"],
                     "versioned": true, "fields": {"Title": "Varchar(255)"}},
                    {"name": "Tag", "fields": {"Title": "Varchar(255)"}}
                ],
                "records": [
                    {"stage": "draft", "type": "Page", "id": 1, "fields": {"Title": "Home"}},
                    {"stage": "published", "type": "Page", "id": 1, "fields": {"Title": "Home"}},
                    {"stage": "draft", "type": "Article", "id": 2, "parent_id": 1,
                     "fields": {"Title": "News"}},
                    {"type": "Tag", "id": 3, "fields": {"Title": "Rust"}, "can_view": false}
                ]
            }"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_get_by_id_matches_subtypes() {
        let store = store();

        let record = store.get_by_id("Page", 2, Stage::Draft).await.unwrap().unwrap();
        assert_eq!(record.record_type(), "Article");
        assert_eq!(record.title(), "News");

        assert!(store.get_by_id("Page", 2, Stage::Published).await.unwrap().is_none());
        assert!(store.get_by_id("Article", 1, Stage::Draft).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unversioned_records_visible_at_every_stage() {
        let store = store();

        for stage in Stage::ALL {
            let tag = store.get_by_id("Tag", 3, stage).await.unwrap().unwrap();
            assert_eq!(tag.id(), 3);
            assert!(!tag.visibility().unwrap().can_view());
        }
    }

    #[tokio::test]
    async fn test_list_is_exact_type() {
        let store = store();

        let pages = store.list("Page", Stage::Draft).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].id(), 1);

        let published = store.list("Article", Stage::Published).await.unwrap();
        assert!(published.is_empty());
    }

    #[tokio::test]
    async fn test_children_and_parents() {
        let store = store();

        let children = store.children_of("Page", 1, Stage::Draft).await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id(), 2);

        assert_eq!(store.parent_id_of("Page", 2, Stage::Draft).await.unwrap(), Some(1));
        assert_eq!(store.parent_id_of("Page", 1, Stage::Draft).await.unwrap(), None);
        assert_eq!(store.parent_id_of("Page", 99, Stage::Draft).await.unwrap(), None);
    }

    #[test]
    fn test_insert_rejects_undeclared_type() {
        let store = store();
        let result = store.insert(MemoryRecord::new("Unknown", 1), Stage::Draft);
        assert!(matches!(result, Err(StoreError::InvalidData(_))));
    }

    #[test]
    fn test_remove() {
        let store = store();
        assert_eq!(store.len(), 4);
        assert!(store.remove("Tag", 3, Stage::Published));
        assert!(!store.remove("Tag", 3, Stage::Draft));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_invalid_json() {
        let result = MemoryRecordStore::from_json("{not json");
        assert!(matches!(result, Err(StoreError::InvalidData(_))));
    }

    #[test]
    fn test_record_fields() {
        let record = MemoryRecord::new("Page", 5)
            .with_parent(4)
            .with_field("Title", "About");

        assert_eq!(record.field("ID"), Some(json!(5)));
        assert_eq!(record.field("ParentID"), Some(json!(4)));
        assert_eq!(record.field("Title"), Some(json!("About")));
        assert_eq!(record.field("Missing"), None);
        assert!(record.visibility().is_none());
    }
}
