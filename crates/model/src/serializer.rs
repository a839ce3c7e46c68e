//! Default JSON serializer.
//!
//! Plain attributes go through their declared [`Transform`]. Relationship
//! values are reduced to string identifiers: a number, a string, or an
//! embedded object carrying an `id` all normalize to `"<id>"`.

use serde_json::Value;
use tessera_schema::{AttributeDecl, AttributeKind, ModelShape, Transform};

use crate::error::ModelError;
use crate::traits::{Normalized, Serializer};

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn normalize(
        &self,
        shape: &ModelShape,
        raw: &Value,
        key: Option<&str>,
    ) -> Result<Normalized, ModelError> {
        let obj = raw.as_object().ok_or_else(|| ModelError::InvalidPayload {
            model: shape.id.clone(),
            message: match key {
                Some(k) => format!("expected an object for '{}', got {}", k, type_name(raw)),
                None => format!("expected an object, got {}", type_name(raw)),
            },
        })?;

        let mut normalized = Normalized::default();
        for decl in shape.fields() {
            let Some(value) = obj.get(&decl.name) else {
                continue;
            };
            match &decl.kind {
                AttributeKind::Attr { transform, .. } => {
                    normalized
                        .attributes
                        .insert(decl.name.clone(), deserialize_value(*transform, value));
                }
                AttributeKind::BelongsTo { .. } => {
                    let id = relationship_id(value).ok_or_else(|| invalid(shape, decl, value))?;
                    normalized.attributes.insert(decl.name.clone(), id);
                }
                AttributeKind::HasMany { .. } => {
                    let ids = relationship_ids(value).ok_or_else(|| invalid(shape, decl, value))?;
                    normalized.attributes.insert(decl.name.clone(), ids);
                }
                AttributeKind::Fragment { .. } | AttributeKind::FragmentArray { .. } => {
                    normalized
                        .fragments
                        .insert(decl.name.clone(), value.clone());
                }
            }
        }
        Ok(normalized)
    }

    fn serialize_attribute(
        &self,
        shape: &ModelShape,
        decl: &AttributeDecl,
        value: &Value,
    ) -> Result<Value, ModelError> {
        match &decl.kind {
            AttributeKind::Attr { transform, .. } => Ok(serialize_value(*transform, value)),
            AttributeKind::BelongsTo { .. } => {
                relationship_id(value).ok_or_else(|| invalid(shape, decl, value))
            }
            AttributeKind::HasMany { .. } => {
                relationship_ids(value).ok_or_else(|| invalid(shape, decl, value))
            }
            AttributeKind::Fragment { .. } | AttributeKind::FragmentArray { .. } => {
                Err(ModelError::AttributeKind {
                    model: shape.id.clone(),
                    attribute: decl.name.clone(),
                    expected: "attr or relationship",
                    actual: decl.kind.as_str(),
                })
            }
        }
    }
}

fn invalid(shape: &ModelShape, decl: &AttributeDecl, value: &Value) -> ModelError {
    ModelError::InvalidValue {
        model: shape.id.clone(),
        attribute: decl.name.clone(),
        message: format!("cannot use {} as a {} value", type_name(value), decl.kind.as_str()),
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ──────────────────────────────────────────────
// Relationship identifiers
// ──────────────────────────────────────────────

/// Reduce a belongsTo value to a string id or `null`.
pub(crate) fn relationship_id(value: &Value) -> Option<Value> {
    match value {
        Value::Null => Some(Value::Null),
        Value::String(s) => Some(Value::String(s.clone())),
        Value::Number(n) => Some(Value::String(n.to_string())),
        Value::Object(obj) => match obj.get("id") {
            Some(Value::String(s)) => Some(Value::String(s.clone())),
            Some(Value::Number(n)) => Some(Value::String(n.to_string())),
            _ => None,
        },
        Value::Bool(_) | Value::Array(_) => None,
    }
}

/// Reduce a hasMany value to an array of string ids, or `null`.
pub(crate) fn relationship_ids(value: &Value) -> Option<Value> {
    match value {
        Value::Null => Some(Value::Null),
        Value::Array(items) => items
            .iter()
            .map(|item| match relationship_id(item) {
                Some(Value::Null) | None => None,
                Some(id) => Some(id),
            })
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
        _ => None,
    }
}

// ──────────────────────────────────────────────
// Transforms
// ──────────────────────────────────────────────

fn deserialize_value(transform: Transform, value: &Value) -> Value {
    match transform {
        Transform::Raw => value.clone(),
        Transform::String => match value {
            Value::Null => Value::Null,
            Value::String(_) => value.clone(),
            Value::Number(n) => Value::String(n.to_string()),
            Value::Bool(b) => Value::String(b.to_string()),
            other => Value::String(other.to_string()),
        },
        Transform::Number => match value {
            Value::Number(_) => value.clone(),
            Value::String(s) => parse_number(s),
            _ => Value::Null,
        },
        Transform::Boolean => match value {
            Value::Bool(_) => value.clone(),
            Value::String(s) => Value::Bool(matches!(
                s.to_ascii_lowercase().as_str(),
                "true" | "t" | "1"
            )),
            Value::Number(n) => Value::Bool(n.as_f64() == Some(1.0)),
            _ => Value::Bool(false),
        },
    }
}

fn serialize_value(transform: Transform, value: &Value) -> Value {
    match (transform, value) {
        (_, Value::Null) => Value::Null,
        (Transform::Number, Value::String(s)) => parse_number(s),
        (Transform::String, Value::Number(n)) => Value::String(n.to_string()),
        _ => value.clone(),
    }
}

fn parse_number(s: &str) -> Value {
    let trimmed = s.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::from(i);
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
