//! Search-engine field mappings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Engine field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Boolean,
    Integer,
    Double,
    Text,
    Keyword,
    Date,
}

/// Type and storage/indexing options for one field.
///
/// An empty spec means "no explicit type": the engine infers one. Options
/// not modelled here are kept verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FieldSpec {
    /// A spec with an explicit engine type.
    pub fn typed(field_type: FieldType) -> Self {
        Self {
            field_type: Some(field_type),
            ..Default::default()
        }
    }

    /// Set the date format string.
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Mark the field as not stored.
    pub fn unstored(mut self) -> Self {
        self.store = Some(false);
        self
    }

    /// Whether the spec leaves everything to the engine.
    pub fn is_empty(&self) -> bool {
        self.field_type.is_none()
            && self.format.is_none()
            && self.store.is_none()
            && self.index.is_none()
            && self.extra.is_empty()
    }
}

/// The field mapping for one document type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeMapping {
    /// Mapping bucket the properties apply to.
    pub doc_type: String,
    /// Field name to spec.
    pub properties: BTreeMap<String, FieldSpec>,
    /// Explicit date detection setting; `None` leaves the engine default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_detection: Option<bool>,
}

impl TypeMapping {
    pub fn new(doc_type: impl Into<String>) -> Self {
        Self {
            doc_type: doc_type.into(),
            ..Default::default()
        }
    }

    /// Mapping request body: the properties plus the date detection flag.
    ///
    /// Empty specs are left out so the engine infers those fields from the
    /// first value it sees.
    pub fn to_body(&self) -> Value {
        let properties: BTreeMap<&String, &FieldSpec> = self
            .properties
            .iter()
            .filter(|(_, spec)| !spec.is_empty())
            .collect();
        let mut body = json!({ "properties": properties });
        if let Some(date_detection) = self.date_detection {
            body["date_detection"] = json!(date_detection);
        }
        body
    }
}
