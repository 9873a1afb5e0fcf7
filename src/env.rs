//! Index and query environments.
//!
//! Both environments are owned by the surrounding search engine and are
//! consumed read-only: the index environment by [`Blueprint::setup`] to
//! validate parameters against the schema, the query environment by
//! [`Blueprint::create_executor`] for per-query parameters.
//!
//! The `Simple*` types are small in-memory implementations for tests and
//! for callers that have no engine around them.
//!
//! [`Blueprint::setup`]: crate::blueprint::Blueprint::setup
//! [`Blueprint::create_executor`]: crate::blueprint::Blueprint::create_executor

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::types::DocId;

/// How a field is stored in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Inverted-index field producing term match positions
    Index,
    /// In-memory per-document attribute
    Attribute,
}

/// Schema metadata for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub id: u32,
    pub name: String,
    pub kind: FieldKind,
}

/// Read-only schema and configuration lookups used during setup.
pub trait IndexEnvironment: Send + Sync {
    /// All fields in id order.
    fn fields(&self) -> &[FieldInfo];

    /// Look up a field by name.
    fn field_by_name(&self, name: &str) -> Option<&FieldInfo> {
        self.fields().iter().find(|f| f.name == name)
    }

    /// Look up a field by id.
    fn field(&self, id: u32) -> Option<&FieldInfo> {
        self.fields().iter().find(|f| f.id == id)
    }

    /// Static rank property configured for the rank profile.
    fn property(&self, key: &str) -> Option<&str>;
}

/// One query term and the fields it is searched in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryTerm {
    pub text: String,
    #[serde(default = "default_term_weight")]
    pub weight: f64,
    /// Ids of the fields this term is matched against
    pub fields: Vec<u32>,
}

fn default_term_weight() -> f64 {
    100.0
}

impl QueryTerm {
    pub fn new(text: impl Into<String>, weight: f64, fields: Vec<u32>) -> Self {
        Self {
            text: text.into(),
            weight,
            fields,
        }
    }
}

/// Per-document attribute values, shared by all executors of a query.
pub trait AttributeVector: Send + Sync {
    fn get(&self, doc: DocId) -> Option<f64>;
}

/// Read-only per-query parameters used when creating executors.
pub trait QueryEnvironment: Send + Sync {
    /// Query terms in query order.
    fn terms(&self) -> &[QueryTerm];

    /// Runtime rank property passed with the query.
    fn property(&self, key: &str) -> Option<&str>;

    /// The attribute vector for `name`, if loaded.
    fn attribute(&self, name: &str) -> Option<Arc<dyn AttributeVector>>;
}

// ============================================================================
// In-memory implementations
// ============================================================================

/// Index environment backed by plain vectors and maps.
#[derive(Debug, Clone, Default)]
pub struct SimpleIndexEnvironment {
    fields: Vec<FieldInfo>,
    properties: FxHashMap<String, String>,
}

impl SimpleIndexEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field, returning its id.
    pub fn add_field(&mut self, name: impl Into<String>, kind: FieldKind) -> u32 {
        let id = self.fields.len() as u32;
        self.fields.push(FieldInfo {
            id,
            name: name.into(),
            kind,
        });
        id
    }

    /// Builder method: add a field
    pub fn with_field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.add_field(name, kind);
        self
    }

    /// Builder method: set a rank property
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

impl IndexEnvironment for SimpleIndexEnvironment {
    fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// Attribute vector backed by a hash map; missing documents have no value.
#[derive(Debug, Clone, Default)]
pub struct MapAttribute {
    values: FxHashMap<DocId, f64>,
}

impl MapAttribute {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, doc: DocId, value: f64) {
        self.values.insert(doc, value);
    }
}

impl FromIterator<(DocId, f64)> for MapAttribute {
    fn from_iter<I: IntoIterator<Item = (DocId, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl AttributeVector for MapAttribute {
    fn get(&self, doc: DocId) -> Option<f64> {
        self.values.get(&doc).copied()
    }
}

/// Query environment backed by plain vectors and maps.
#[derive(Clone, Default)]
pub struct SimpleQueryEnvironment {
    terms: Vec<QueryTerm>,
    properties: FxHashMap<String, String>,
    attributes: FxHashMap<String, Arc<dyn AttributeVector>>,
}

impl SimpleQueryEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: add a query term
    pub fn with_term(mut self, term: QueryTerm) -> Self {
        self.terms.push(term);
        self
    }

    /// Builder method: set a rank property
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Builder method: make an attribute vector available
    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        attribute: impl AttributeVector + 'static,
    ) -> Self {
        self.attributes.insert(name.into(), Arc::new(attribute));
        self
    }
}

impl std::fmt::Debug for SimpleQueryEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleQueryEnvironment")
            .field("terms", &self.terms)
            .field("properties", &self.properties)
            .field("attributes", &self.attributes.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl QueryEnvironment for SimpleQueryEnvironment {
    fn terms(&self) -> &[QueryTerm] {
        &self.terms
    }

    fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    fn attribute(&self, name: &str) -> Option<Arc<dyn AttributeVector>> {
        self.attributes.get(name).cloned()
    }
}
