//! Deserialization from schema JSON bundles into typed structs.
//!
//! The main entry point is [`from_schema`], which takes a
//! `&serde_json::Value` and produces a [`SchemaBundle`].

use crate::types::*;

/// Errors while reading or validating a schema bundle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The bundle is missing a required top-level field.
    #[error("bundle missing required field: '{field}'")]
    MissingField { field: String },

    /// A construct or one of its attributes is malformed.
    #[error("{kind} '{id}': {message}")]
    ConstructError {
        kind: String,
        id: String,
        message: String,
    },

    /// The bundle structure is invalid.
    #[error("invalid bundle: {0}")]
    InvalidBundle(String),

    /// Two constructs share an id.
    #[error("model '{0}' is declared more than once")]
    DuplicateModel(String),

    /// A lookup or reference names a model that is not declared.
    #[error("unknown model '{0}'")]
    UnknownModel(String),

    /// A reference points at the wrong kind of construct, e.g. a
    /// `fragmentArray` of a record model.
    #[error("model '{model}' attribute '{attribute}' expects a {expected} target, '{target}' is a {actual}")]
    KindMismatch {
        model: String,
        attribute: String,
        target: String,
        expected: String,
        actual: String,
    },
}

/// Deserialize a schema JSON bundle into typed structs.
///
/// Walks the `constructs` array and dispatches on the `kind` field.
/// Unknown construct kinds are silently skipped for forward compatibility.
pub fn from_schema(bundle: &serde_json::Value) -> Result<SchemaBundle, SchemaError> {
    let id = bundle
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| SchemaError::MissingField {
            field: "id".to_string(),
        })?
        .to_string();

    let version = bundle
        .get("version")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let constructs_arr = bundle
        .get("constructs")
        .and_then(|c| c.as_array())
        .ok_or_else(|| SchemaError::MissingField {
            field: "constructs".to_string(),
        })?;

    let mut constructs = Vec::with_capacity(constructs_arr.len());

    for obj in constructs_arr {
        let kind = match obj.get("kind").and_then(|k| k.as_str()).unwrap_or("") {
            "Model" => ModelKind::Model,
            "Fragment" => ModelKind::Fragment,
            _ => continue, // Skip unknown kinds for forward compatibility
        };
        constructs.push(parse_model(obj, kind)?);
    }

    Ok(SchemaBundle {
        id,
        version,
        constructs,
    })
}

// ── Parsing helpers ─────────────────────────────────────────────────

fn required_str(obj: &serde_json::Value, field: &str) -> Result<String, SchemaError> {
    obj.get(field)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| SchemaError::InvalidBundle(format!("missing '{}' field", field)))
}

fn parse_model(obj: &serde_json::Value, kind: ModelKind) -> Result<ModelConstruct, SchemaError> {
    let id = required_str(obj, "id")?;

    let attributes = match obj.get("attributes") {
        None => Vec::new(),
        Some(serde_json::Value::Array(arr)) => arr
            .iter()
            .map(|a| parse_attribute(a, kind, &id))
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => {
            return Err(SchemaError::ConstructError {
                kind: kind.as_str().to_string(),
                id,
                message: "'attributes' must be an array".to_string(),
            })
        }
    };

    let mut seen = std::collections::BTreeSet::new();
    for attr in &attributes {
        if !seen.insert(attr.name.as_str()) {
            return Err(SchemaError::ConstructError {
                kind: kind.as_str().to_string(),
                id: id.clone(),
                message: format!("attribute '{}' declared more than once", attr.name),
            });
        }
    }

    Ok(ModelConstruct {
        id,
        kind,
        attributes,
    })
}

fn parse_attribute(
    obj: &serde_json::Value,
    owner_kind: ModelKind,
    owner_id: &str,
) -> Result<AttributeDecl, SchemaError> {
    let construct_error = |message: String| SchemaError::ConstructError {
        kind: owner_kind.as_str().to_string(),
        id: owner_id.to_string(),
        message,
    };

    let name = obj
        .get("name")
        .and_then(|v| v.as_str())
        .ok_or_else(|| construct_error("attribute missing 'name'".to_string()))?
        .to_string();

    let target = || {
        obj.get("model")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| construct_error(format!("attribute '{}' missing 'model'", name)))
    };
    let is_async = obj.get("async").and_then(|v| v.as_bool()).unwrap_or(false);

    let kind = match obj.get("kind").and_then(|v| v.as_str()).unwrap_or("attr") {
        "attr" => {
            let transform = match obj.get("type") {
                None => Transform::Raw,
                Some(t) => serde_json::from_value(t.clone()).map_err(|_| {
                    construct_error(format!("attribute '{}' has unknown type {}", name, t))
                })?,
            };
            AttributeKind::Attr {
                transform,
                default: obj.get("default").cloned(),
            }
        }
        "belongsTo" => AttributeKind::BelongsTo {
            model: target()?,
            is_async,
        },
        "hasMany" => AttributeKind::HasMany {
            model: target()?,
            is_async,
        },
        "fragment" => AttributeKind::Fragment { model: target()? },
        "fragmentArray" => AttributeKind::FragmentArray { model: target()? },
        other => {
            return Err(construct_error(format!(
                "attribute '{}' has unknown kind '{}'",
                name, other
            )))
        }
    };

    Ok(AttributeDecl { name, kind })
}
