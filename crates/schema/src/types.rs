//! Typed structs representing a tessera schema bundle.
//!
//! A bundle declares every record model and fragment model the store can
//! resolve. Attribute declarations carry just enough metadata for the
//! engine to tell plain attributes, foreign-key relationships and
//! fragment-valued attributes apart.

use serde::{Deserialize, Serialize};

/// Top-level schema bundle containing all model constructs.
#[derive(Debug, Clone)]
pub struct SchemaBundle {
    /// Bundle identifier (application name).
    pub id: String,
    /// Schema format version (e.g. "1.0").
    pub version: String,
    pub constructs: Vec<ModelConstruct>,
}

/// Whether a construct declares a top-level record or an owner-bound fragment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ModelKind {
    Model,
    Fragment,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Model => "Model",
            ModelKind::Fragment => "Fragment",
        }
    }
}

/// A Model or Fragment construct.
#[derive(Debug, Clone)]
pub struct ModelConstruct {
    pub id: String,
    pub kind: ModelKind,
    /// Attributes in declaration order; serialization preserves this order.
    pub attributes: Vec<AttributeDecl>,
}

/// Value transform applied when normalizing and serializing a plain attribute.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Transform {
    String,
    Number,
    Boolean,
    /// Pass the JSON value through untouched.
    #[default]
    Raw,
}

impl Transform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transform::String => "string",
            Transform::Number => "number",
            Transform::Boolean => "boolean",
            Transform::Raw => "raw",
        }
    }
}

/// What an attribute holds.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeKind {
    /// A plain value.
    Attr {
        transform: Transform,
        default: Option<serde_json::Value>,
    },
    /// Foreign key to one record of `model`.
    BelongsTo { model: String, is_async: bool },
    /// Foreign keys to many records of `model`.
    HasMany { model: String, is_async: bool },
    /// A single nested fragment of `model`.
    Fragment { model: String },
    /// An ordered collection of fragments of `model`.
    FragmentArray { model: String },
}

impl AttributeKind {
    /// Name used in schema JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeKind::Attr { .. } => "attr",
            AttributeKind::BelongsTo { .. } => "belongsTo",
            AttributeKind::HasMany { .. } => "hasMany",
            AttributeKind::Fragment { .. } => "fragment",
            AttributeKind::FragmentArray { .. } => "fragmentArray",
        }
    }

    pub fn is_relationship(&self) -> bool {
        matches!(
            self,
            AttributeKind::BelongsTo { .. } | AttributeKind::HasMany { .. }
        )
    }

    pub fn is_fragment(&self) -> bool {
        matches!(
            self,
            AttributeKind::Fragment { .. } | AttributeKind::FragmentArray { .. }
        )
    }

    /// The model this attribute points at, if any.
    pub fn target_model(&self) -> Option<&str> {
        match self {
            AttributeKind::Attr { .. } => None,
            AttributeKind::BelongsTo { model, .. }
            | AttributeKind::HasMany { model, .. }
            | AttributeKind::Fragment { model }
            | AttributeKind::FragmentArray { model } => Some(model),
        }
    }
}

/// One declared attribute on a model.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDecl {
    pub name: String,
    pub kind: AttributeKind,
}
