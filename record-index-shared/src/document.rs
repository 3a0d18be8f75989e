//! Search documents and their deterministic identities.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::fields;
use crate::stage::Stage;

/// Ordered mapping of field name to value.
pub type FieldMap = Map<String, Value>;

/// Separator between the parts of a document id.
const SEPARATOR: char = '_';

/// Identity of an indexed `(record, stage)` pair.
///
/// Renders as `{Type}_{ID}_{stage}` when stage-aware and `{Type}_{ID}`
/// otherwise. [`DocumentId::parse`] reverses the rendering, so both must be
/// changed together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId {
    /// Concrete record type.
    pub record_type: String,
    /// Numeric record identifier.
    pub record_id: u64,
    /// Stage the document was built for, `None` for stage-agnostic documents.
    pub stage: Option<Stage>,
}

impl DocumentId {
    /// Create a stage-aware id.
    pub fn new(record_type: impl Into<String>, record_id: u64, stage: Stage) -> Self {
        Self {
            record_type: record_type.into(),
            record_id,
            stage: Some(stage),
        }
    }

    /// Create an id that does not encode a stage.
    pub fn unstaged(record_type: impl Into<String>, record_id: u64) -> Self {
        Self {
            record_type: record_type.into(),
            record_id,
            stage: None,
        }
    }

    /// Parse an id string.
    ///
    /// Splits from the right so type names that contain the separator still
    /// parse. A trailing segment that is not a known stage is read as the
    /// numeric id of the 2-part form.
    pub fn parse(id: &str) -> Option<Self> {
        let (head, last) = id.rsplit_once(SEPARATOR)?;

        if let Some(stage) = Stage::parse(last) {
            let (record_type, record_id) = head.rsplit_once(SEPARATOR)?;
            return Self::from_parts(record_type, record_id, Some(stage));
        }

        Self::from_parts(head, last, None)
    }

    fn from_parts(record_type: &str, record_id: &str, stage: Option<Stage>) -> Option<Self> {
        if record_type.is_empty() {
            return None;
        }
        let record_id = record_id.parse::<u64>().ok().filter(|id| *id > 0)?;

        Some(Self {
            record_type: record_type.to_string(),
            record_id,
            stage,
        })
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stage {
            Some(stage) => write!(
                f,
                "{}{SEPARATOR}{}{SEPARATOR}{}",
                self.record_type, self.record_id, stage
            ),
            None => write!(f, "{}{SEPARATOR}{}", self.record_type, self.record_id),
        }
    }
}

/// The indexed representation of one `(record, stage)` pair.
///
/// Documents are built on demand and never mutated after being handed to the
/// writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Deterministic identity.
    pub id: DocumentId,
    /// Mapping bucket the document belongs to (the record's base type).
    pub index_type: String,
    /// Flattened field values.
    pub fields: FieldMap,
    /// Stage tags; a single stage for versioned records, all stages otherwise.
    pub stages: Vec<Stage>,
}

impl Document {
    /// The id string sent to the search engine.
    pub fn doc_id(&self) -> String {
        self.id.to_string()
    }

    /// Payload sent to the search engine: the fields plus the concrete type
    /// and the stage tags.
    pub fn source(&self) -> Value {
        let mut source = self.fields.clone();
        source.insert(fields::CLASS_NAME.to_string(), json!(self.id.record_type));
        source.insert(fields::STAGE.to_string(), json!(self.stages));
        Value::Object(source)
    }
}
