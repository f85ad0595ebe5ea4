//! Field descriptors and the per-table classification

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use super::errors::{FieldError, FieldResult};
use super::names::FieldNames;
use super::types::{untyped_value_from_json, SemanticType};
use crate::value::Row;

/// Role of a field in versioning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Identifier of the logical entity
    Id,
    /// A change opens a new version
    Compare,
    /// A change rewrites the active version
    Update,
    /// Written, never compared
    Lazy,
    /// Ignored completely
    Ignore,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Id => "id",
            FieldKind::Compare => "compare",
            FieldKind::Update => "update",
            FieldKind::Lazy => "lazy",
            FieldKind::Ignore => "ignore",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One classified field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    #[serde(flatten)]
    pub field_type: SemanticType,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, kind: FieldKind, field_type: SemanticType) -> Self {
        Self {
            name: name.into(),
            kind,
            field_type,
        }
    }
}

/// Ordered classification of a table's fields.
///
/// Order is declaration order and is preserved in every generated statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldClassification {
    fields: Vec<FieldDescriptor>,
}

impl FieldClassification {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field declaration.
    pub fn with(mut self, name: impl Into<String>, kind: FieldKind, field_type: SemanticType) -> Self {
        self.push(FieldDescriptor::new(name, kind, field_type));
        self
    }

    pub fn push(&mut self, descriptor: FieldDescriptor) {
        self.fields.push(descriptor);
    }

    /// Classify every name with the same kind and type.
    pub fn uniform<I, S>(names: I, kind: FieldKind, field_type: SemanticType) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: names
                .into_iter()
                .map(|name| FieldDescriptor::new(name, kind, field_type))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|d| d.name == name)
    }

    /// Reclassify an already declared field. Returns false if it is unknown.
    pub fn set_kind(&mut self, name: &str, kind: FieldKind) -> bool {
        match self.fields.iter_mut().find(|d| d.name == name) {
            Some(descriptor) => {
                descriptor.kind = kind;
                true
            }
            None => false,
        }
    }

    /// Descriptors of one kind, in declaration order.
    pub fn descriptors(&self, kind: FieldKind) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(move |d| d.kind == kind)
    }

    /// Names of one kind, in declaration order.
    pub fn names(&self, kind: FieldKind) -> Vec<&str> {
        self.descriptors(kind).map(|d| d.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check the classification against the bookkeeping column names.
    pub fn validate(&self, names: &FieldNames) -> FieldResult<()> {
        let mut seen = HashSet::new();
        for descriptor in &self.fields {
            if descriptor.name.is_empty() {
                return Err(FieldError::EmptyName);
            }
            if !seen.insert(descriptor.name.as_str()) {
                return Err(FieldError::Duplicate(descriptor.name.clone()));
            }
            if descriptor.kind != FieldKind::Ignore && names.all().any(|n| n == descriptor.name) {
                return Err(FieldError::Reserved(descriptor.name.clone()));
            }
        }
        if self.descriptors(FieldKind::Id).next().is_none() {
            return Err(FieldError::NoIdentifier);
        }
        Ok(())
    }

    /// Build a row from a JSON object.
    ///
    /// Classified fields are converted by their declared type; anything else
    /// is carried through untyped.
    pub fn row_from_json(&self, json: &JsonValue) -> FieldResult<Row> {
        let object: &Map<String, JsonValue> = json.as_object().ok_or(FieldError::NotAnObject)?;
        let mut row = Row::new();
        for (name, value) in object {
            let converted = match self.get(name) {
                Some(descriptor) => descriptor.field_type.value_from_json(name, value)?,
                None => untyped_value_from_json(value),
            };
            row.set(name.clone(), converted);
        }
        Ok(row)
    }
}
