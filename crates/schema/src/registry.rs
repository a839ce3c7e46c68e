//! Resolved model registry: `model_for` lookups and attribute enumeration.

use std::collections::BTreeMap;

use crate::deserialize::{from_schema, SchemaError};
use crate::types::*;

/// The declared shape of one record model or fragment model.
#[derive(Debug, Clone)]
pub struct ModelShape {
    pub id: String,
    pub kind: ModelKind,
    attributes: Vec<AttributeDecl>,
}

impl ModelShape {
    pub fn is_fragment(&self) -> bool {
        self.kind == ModelKind::Fragment
    }

    /// Plain and fragment-valued attributes, in declaration order.
    pub fn attributes(&self) -> impl Iterator<Item = &AttributeDecl> {
        self.attributes.iter().filter(|a| !a.kind.is_relationship())
    }

    /// `belongsTo` and `hasMany` declarations, in declaration order.
    pub fn relationships(&self) -> impl Iterator<Item = &AttributeDecl> {
        self.attributes.iter().filter(|a| a.kind.is_relationship())
    }

    /// Only the fragment-valued attributes.
    pub fn fragment_attributes(&self) -> impl Iterator<Item = &AttributeDecl> {
        self.attributes.iter().filter(|a| a.kind.is_fragment())
    }

    /// Every declaration, in declaration order.
    pub fn fields(&self) -> &[AttributeDecl] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDecl> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// Every model a store can resolve, validated for internal consistency.
#[derive(Debug, Clone)]
pub struct Schema {
    pub id: String,
    models: BTreeMap<String, ModelShape>,
}

impl Schema {
    /// Build a registry from a parsed bundle.
    ///
    /// Fails if two constructs share an id, if an attribute references an
    /// undeclared model, or if a reference targets the wrong construct kind
    /// (fragments must point at Fragment constructs, relationships at Model
    /// constructs).
    pub fn new(bundle: SchemaBundle) -> Result<Self, SchemaError> {
        let mut models = BTreeMap::new();
        for construct in bundle.constructs {
            if models.contains_key(&construct.id) {
                return Err(SchemaError::DuplicateModel(construct.id));
            }
            models.insert(
                construct.id.clone(),
                ModelShape {
                    id: construct.id,
                    kind: construct.kind,
                    attributes: construct.attributes,
                },
            );
        }

        for shape in models.values() {
            for attr in &shape.attributes {
                let Some(target) = attr.kind.target_model() else {
                    continue;
                };
                let target_shape = models
                    .get(target)
                    .ok_or_else(|| SchemaError::UnknownModel(target.to_string()))?;
                let expected = if attr.kind.is_fragment() {
                    ModelKind::Fragment
                } else {
                    ModelKind::Model
                };
                if target_shape.kind != expected {
                    return Err(SchemaError::KindMismatch {
                        model: shape.id.clone(),
                        attribute: attr.name.clone(),
                        target: target.to_string(),
                        expected: expected.as_str().to_string(),
                        actual: target_shape.kind.as_str().to_string(),
                    });
                }
            }
        }

        Ok(Schema {
            id: bundle.id,
            models,
        })
    }

    /// Parse and validate a schema JSON bundle in one step.
    pub fn from_json(bundle: &serde_json::Value) -> Result<Self, SchemaError> {
        Schema::new(from_schema(bundle)?)
    }

    pub fn model_for(&self, name: &str) -> Result<&ModelShape, SchemaError> {
        self.models
            .get(name)
            .ok_or_else(|| SchemaError::UnknownModel(name.to_string()))
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelShape> {
        self.models.values()
    }
}
