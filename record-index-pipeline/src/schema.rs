//! Derives search field mappings from record type descriptions.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use record_index_shared::{fields, FieldSpec, FieldType, TypeMapping};
use serde::Deserialize;
use tracing::debug;

use crate::store::{StorageType, TypeDescriptor};

/// Hook that adjusts a derived mapping after the built-in rules ran.
pub trait MappingDecorator: Send + Sync {
    fn decorate(&self, descriptor: &TypeDescriptor, properties: &mut BTreeMap<String, FieldSpec>);
}

impl<F> MappingDecorator for F
where
    F: Fn(&TypeDescriptor, &mut BTreeMap<String, FieldSpec>) + Send + Sync,
{
    fn decorate(&self, descriptor: &TypeDescriptor, properties: &mut BTreeMap<String, FieldSpec>) {
        self(descriptor, properties)
    }
}

/// Search type for a storage kind. `None` leaves the type to the engine.
pub fn translate(storage: &StorageType) -> Option<FieldType> {
    match storage {
        StorageType::Boolean => Some(FieldType::Boolean),
        StorageType::Int | StorageType::Year => Some(FieldType::Integer),
        StorageType::Decimal
        | StorageType::Double
        | StorageType::Currency
        | StorageType::Float => Some(FieldType::Double),
        StorageType::Text
        | StorageType::Varchar
        | StorageType::HtmlText
        | StorageType::MultiValue => Some(FieldType::Text),
        StorageType::Enum | StorageType::Locale => Some(FieldType::Keyword),
        StorageType::Datetime | StorageType::Date => Some(FieldType::Date),
        StorageType::Other(_) => None,
    }
}

fn spec_for(field_type: FieldType) -> FieldSpec {
    let spec = FieldSpec::typed(field_type);
    if field_type == FieldType::Date {
        spec.with_format(fields::ENGINE_DATE_FORMAT)
    } else {
        spec
    }
}

/// Fields every indexed type carries.
fn system_fields() -> [(&'static str, FieldType); 11] {
    [
        (fields::ID, FieldType::Integer),
        (fields::PARENT_ID, FieldType::Integer),
        (fields::SORT, FieldType::Integer),
        (fields::CREATED, FieldType::Date),
        (fields::LAST_EDITED, FieldType::Date),
        (fields::TITLE, FieldType::Text),
        (fields::SHOW_IN_SEARCH, FieldType::Boolean),
        (fields::CLASS_NAME, FieldType::Keyword),
        (fields::CLASS_NAME_HIERARCHY, FieldType::Keyword),
        (fields::PARENTS_HIERARCHY, FieldType::Integer),
        (fields::STAGE, FieldType::Keyword),
    ]
}

/// Derives and caches one [`TypeMapping`] per record type.
pub struct SchemaMapper {
    decorators: Vec<Arc<dyn MappingDecorator>>,
    cache: RwLock<HashMap<String, Arc<TypeMapping>>>,
}

impl Default for SchemaMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaMapper {
    pub fn new() -> Self {
        Self {
            decorators: Vec::new(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Register a decorator. Decorators run in registration order.
    pub fn with_decorator(mut self, decorator: impl MappingDecorator + 'static) -> Self {
        self.decorators.push(Arc::new(decorator));
        self
    }

    /// The mapping for a type, derived on first use.
    pub fn mapping_for(&self, descriptor: &TypeDescriptor) -> Arc<TypeMapping> {
        if let Some(mapping) = self.cache.read().get(&descriptor.name) {
            return mapping.clone();
        }

        let mapping = Arc::new(self.derive(descriptor));
        self.cache
            .write()
            .entry(descriptor.name.clone())
            .or_insert(mapping)
            .clone()
    }

    /// Derive a mapping without consulting the cache.
    ///
    /// Only indexed fields are mapped. Fields whose storage kind has no
    /// search type get an empty spec so the engine picks the type.
    pub fn derive(&self, descriptor: &TypeDescriptor) -> TypeMapping {
        let mut mapping = TypeMapping::new(&descriptor.name);

        for name in descriptor.indexed_fields() {
            let mut spec = descriptor
                .storage_type(name)
                .and_then(translate)
                .map(spec_for)
                .unwrap_or_default();
            if descriptor.is_unstored(name) {
                spec = spec.unstored();
            }
            mapping.properties.insert(name.to_string(), spec);
        }

        for (name, field_type) in system_fields() {
            mapping.properties.insert(name.to_string(), spec_for(field_type));
        }

        for decorator in &self.decorators {
            decorator.decorate(descriptor, &mut mapping.properties);
        }

        debug!(
            record_type = %descriptor.name,
            fields = mapping.properties.len(),
            "Derived field mapping"
        );
        mapping
    }

    /// Forget every derived mapping.
    pub fn clear_cache(&self) {
        self.cache.write().clear();
    }
}

/// Administrator-supplied mappings that replace derived ones.
///
/// Keyed by record type or by index type. Overrides are always sent with
/// date detection disabled.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct MappingOverrides(BTreeMap<String, BTreeMap<String, FieldSpec>>);

impl MappingOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }

    pub fn with_type(
        mut self,
        doc_type: impl Into<String>,
        properties: BTreeMap<String, FieldSpec>,
    ) -> Self {
        self.0.insert(doc_type.into(), properties);
        self
    }

    pub fn contains(&self, doc_type: &str) -> bool {
        self.0.contains_key(doc_type)
    }

    /// The override registered under `doc_type`.
    pub fn mapping_for(&self, doc_type: &str) -> Option<TypeMapping> {
        let properties = self.0.get(doc_type)?;
        let mut mapping = TypeMapping::new(doc_type);
        mapping.properties = properties.clone();
        mapping.date_detection = Some(false);
        Some(mapping)
    }

    /// The override covering a type: its own first, then its index type's.
    pub fn resolve(&self, descriptor: &TypeDescriptor) -> Option<TypeMapping> {
        self.mapping_for(&descriptor.name)
            .or_else(|| self.mapping_for(descriptor.index_type()))
    }

    /// Every type name an override is registered under.
    pub fn doc_types(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.keys().map(String::as_str)
    }
}
