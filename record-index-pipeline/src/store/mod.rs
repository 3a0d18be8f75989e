//! The record store collaborator.
//!
//! The pipeline never owns records. It asks a [`RecordStore`] for type
//! descriptions and for the live records to index or hydrate.

mod memory;

pub use memory::{MemoryRecord, MemoryRecordStore, RecordExport, StagedRecord};

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use record_index_shared::{fields, Stage};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::StoreError;

/// Shared handle to a live record.
pub type RecordRef = Arc<dyn SearchableRecord>;

/// Storage-level kind of a declared field.
///
/// Parsed from storage names such as `Varchar(255)`; parameters in
/// parentheses are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StorageType {
    Boolean,
    Int,
    Year,
    Decimal,
    Double,
    Currency,
    Float,
    Text,
    Varchar,
    HtmlText,
    Enum,
    Locale,
    Datetime,
    Date,
    MultiValue,
    /// Any storage kind without a search mapping.
    Other(String),
}

impl StorageType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Boolean => "Boolean",
            Self::Int => "Int",
            Self::Year => "Year",
            Self::Decimal => "Decimal",
            Self::Double => "Double",
            Self::Currency => "Currency",
            Self::Float => "Float",
            Self::Text => "Text",
            Self::Varchar => "Varchar",
            Self::HtmlText => "HTMLText",
            Self::Enum => "Enum",
            Self::Locale => "Locale",
            Self::Datetime => "Datetime",
            Self::Date => "Date",
            Self::MultiValue => "MultiValueField",
            Self::Other(name) => name,
        }
    }
}

impl From<&str> for StorageType {
    fn from(name: &str) -> Self {
        let base = name.split('(').next().unwrap_or(name).trim();
        match base {
            "Boolean" => Self::Boolean,
            "Int" => Self::Int,
            "Year" => Self::Year,
            "Decimal" => Self::Decimal,
            "Double" => Self::Double,
            "Currency" => Self::Currency,
            "Float" => Self::Float,
            "Text" => Self::Text,
            "Varchar" => Self::Varchar,
            "HTMLText" | "HTMLVarchar" => Self::HtmlText,
            "Enum" => Self::Enum,
            "Locale" => Self::Locale,
            "Datetime" | "SS_Datetime" | "DBDatetime" => Self::Datetime,
            "Date" => Self::Date,
            "MultiValueField" => Self::MultiValue,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for StorageType {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<StorageType> for String {
    fn from(storage: StorageType) -> Self {
        storage.as_str().to_string()
    }
}

impl FromStr for StorageType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the store knows about one record type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// Concrete type name.
    pub name: String,
    /// Root of the type's family, if it is a subtype.
    #[serde(default)]
    pub base_type: Option<String>,
    /// Type lineage from the root down to this type.
    #[serde(default)]
    pub ancestry: Vec<String>,
    /// Declared fields and their storage kinds.
    #[serde(default)]
    pub fields: BTreeMap<String, StorageType>,
    /// Fields to index; every declared field when absent.
    #[serde(default)]
    pub searchable_fields: Option<Vec<String>>,
    /// Indexed fields the engine should not store.
    #[serde(default)]
    pub unstored_fields: Vec<String>,
    /// Whether records carry separate draft and published copies.
    #[serde(default)]
    pub versioned: bool,
    /// Whether records form a parent/child tree.
    #[serde(default)]
    pub hierarchical: bool,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_type: None,
            ancestry: Vec::new(),
            fields: BTreeMap::new(),
            searchable_fields: None,
            unstored_fields: Vec::new(),
            versioned: false,
            hierarchical: false,
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, storage: impl Into<StorageType>) -> Self {
        self.fields.insert(name.into(), storage.into());
        self
    }

    /// Declare this type a subtype of `base_type`.
    pub fn with_base(mut self, base_type: impl Into<String>) -> Self {
        self.base_type = Some(base_type.into());
        self
    }

    pub fn with_ancestry<I, S>(mut self, ancestry: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ancestry = ancestry.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_searchable_fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.searchable_fields = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_unstored_field(mut self, name: impl Into<String>) -> Self {
        self.unstored_fields.push(name.into());
        self
    }

    pub fn versioned(mut self) -> Self {
        self.versioned = true;
        self
    }

    pub fn hierarchical(mut self) -> Self {
        self.hierarchical = true;
        self
    }

    /// Mapping bucket shared by the whole type family.
    pub fn index_type(&self) -> &str {
        self.base_type.as_deref().unwrap_or(&self.name)
    }

    /// Names of the fields to index. Explicit searchable fields keep their
    /// given order, declared fields are listed by name.
    pub fn indexed_fields(&self) -> Vec<&str> {
        match &self.searchable_fields {
            Some(names) => names.iter().map(String::as_str).collect(),
            None => self.fields.keys().map(String::as_str).collect(),
        }
    }

    pub fn storage_type(&self, field: &str) -> Option<&StorageType> {
        self.fields.get(field)
    }

    pub fn is_unstored(&self, field: &str) -> bool {
        self.unstored_fields.iter().any(|name| name == field)
    }

    /// Whether this type is `type_name` or descends from it.
    pub fn is_a(&self, type_name: &str) -> bool {
        self.name == type_name
            || self.base_type.as_deref() == Some(type_name)
            || self.ancestry.iter().any(|ancestor| ancestor == type_name)
    }
}

/// Optional per-record access check.
pub trait VisibilityCheck {
    fn can_view(&self) -> bool;
}

/// A live record the pipeline can index.
pub trait SearchableRecord: Send + Sync + fmt::Debug {
    /// Concrete type name.
    fn record_type(&self) -> &str;

    fn id(&self) -> u64;

    fn parent_id(&self) -> Option<u64> {
        None
    }

    /// Raw value of a named field, `None` when unset.
    fn field(&self, name: &str) -> Option<Value>;

    /// Human readable label used in progress output.
    fn title(&self) -> String {
        self.field(fields::TITLE)
            .and_then(|value| value.as_str().map(str::to_string))
            .unwrap_or_else(|| format!("{} #{}", self.record_type(), self.id()))
    }

    /// Whether the record may appear in search results at all, read from
    /// its `ShowInSearch` flag. Records without the flag are shown.
    fn show_in_search(&self) -> bool {
        match self.field(fields::SHOW_IN_SEARCH) {
            Some(Value::Bool(show)) => show,
            Some(Value::Number(flag)) => flag.as_f64() != Some(0.0),
            Some(Value::String(flag)) => !matches!(flag.trim(), "" | "0" | "false"),
            _ => true,
        }
    }

    /// The record's access check, if it has one.
    fn visibility(&self) -> Option<&dyn VisibilityCheck> {
        None
    }
}

/// Source of record types and live records.
///
/// Lookups by type also match subtypes of that type, except
/// [`RecordStore::list`] which returns records of exactly the given type.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every type that should be kept in the index.
    fn indexed_types(&self) -> Vec<Arc<TypeDescriptor>>;

    fn descriptor(&self, record_type: &str) -> Option<Arc<TypeDescriptor>>;

    async fn get_by_id(
        &self,
        record_type: &str,
        id: u64,
        stage: Stage,
    ) -> Result<Option<RecordRef>, StoreError>;

    async fn list(&self, record_type: &str, stage: Stage) -> Result<Vec<RecordRef>, StoreError>;

    async fn children_of(
        &self,
        base_type: &str,
        parent_id: u64,
        stage: Stage,
    ) -> Result<Vec<RecordRef>, StoreError>;

    /// Parent of a record, `None` for roots and unknown records.
    async fn parent_id_of(
        &self,
        record_type: &str,
        id: u64,
        stage: Stage,
    ) -> Result<Option<u64>, StoreError> {
        Ok(self
            .get_by_id(record_type, id, stage)
            .await?
            .and_then(|record| record.parent_id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_type_parsing() {
        assert_eq!(StorageType::from("Varchar(255)"), StorageType::Varchar);
        assert_eq!(StorageType::from("Enum('A,B', 'A')"), StorageType::Enum);
        assert_eq!(StorageType::from("HTMLText"), StorageType::HtmlText);
        assert_eq!(StorageType::from("DBDatetime"), StorageType::Datetime);
        assert_eq!(
            StorageType::from("ForeignKey"),
            StorageType::Other("ForeignKey".to_string())
        );
    }

    #[test]
    fn test_storage_type_serde() {
        let storage: StorageType = serde_json::from_str("\"Decimal(9,2)\"").unwrap();
        assert_eq!(storage, StorageType::Decimal);
        assert_eq!(serde_json::to_string(&storage).unwrap(), "\"Decimal\"");
    }

    #[test]
    fn test_descriptor_index_type() {
        let page = TypeDescriptor::new("Page");
        assert_eq!(page.index_type(), "Page");

        let article = TypeDescriptor::new("Article").with_base("Page");
        assert_eq!(article.index_type(), "Page");
        assert!(article.is_a("Page"));
        assert!(article.is_a("Article"));
        assert!(!page.is_a("Article"));
    }

    #[test]
    fn test_indexed_fields() {
        let descriptor = TypeDescriptor::new("Article")
            .with_field("Title", "Varchar")
            .with_field("Body", "HTMLText")
            .with_field("Secret", "Text");
        assert_eq!(descriptor.indexed_fields(), vec!["Body", "Secret", "Title"]);

        let descriptor = descriptor.with_searchable_fields(["Title", "Body"]);
        assert_eq!(descriptor.indexed_fields(), vec!["Title", "Body"]);
    }

    #[test]
    fn test_show_in_search_flag() {
        use crate::store::MemoryRecord;

        assert!(MemoryRecord::new("Page", 1).show_in_search());
        assert!(MemoryRecord::new("Page", 1).with_field("ShowInSearch", true).show_in_search());
        assert!(!MemoryRecord::new("Page", 1).with_field("ShowInSearch", false).show_in_search());
        assert!(!MemoryRecord::new("Page", 1).with_field("ShowInSearch", 0).show_in_search());
        assert!(!MemoryRecord::new("Page", 1).with_field("ShowInSearch", "0").show_in_search());
        assert!(MemoryRecord::new("Page", 1).with_field("ShowInSearch", 1).show_in_search());
    }

    #[test]
    fn test_descriptor_from_json() {
        let descriptor: TypeDescriptor = serde_json::from_str(
            r#"{"name": "Article", "base_type": "Page", "fields": {"Title": "Varchar(255)"}, "versioned": true}"#,
        )
        .unwrap();
        assert_eq!(descriptor.index_type(), "Page");
        assert_eq!(descriptor.storage_type("Title"), Some(&StorageType::Varchar));
        assert!(descriptor.versioned);
        assert!(!descriptor.hierarchical);
    }
}
