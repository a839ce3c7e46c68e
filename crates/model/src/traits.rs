use std::collections::BTreeMap;

use serde_json::Value;
use tessera_schema::{AttributeDecl, ModelShape};

use crate::entity::AttributeMap;
use crate::error::ModelError;

/// Raw wire data split into what the entity stores directly and what the
/// store must turn into nested fragments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    /// Plain attributes and relationship identifiers, ready for `data`.
    pub attributes: AttributeMap,
    /// Raw payloads for `fragment` / `fragmentArray` attributes, keyed by
    /// attribute name. Absent keys mean the payload omitted the attribute.
    pub fragments: BTreeMap<String, Value>,
}

/// The serializer collaborator.
///
/// The store calls `normalize` whenever raw wire data is set up on a record
/// or fragment, and `serialize_attribute` for every plain attribute and
/// relationship when producing wire output. Fragment and fragment-array
/// attributes are serialized by the store itself, recursing into each
/// member's serializer, so implementations never see nested fragments.
///
/// A serializer can be registered per model with
/// [`Store::register_serializer`](crate::Store::register_serializer);
/// models without one use [`JsonSerializer`](crate::JsonSerializer).
pub trait Serializer {
    /// Convert raw wire data for `shape` into normalized attributes.
    ///
    /// `key` is the owner attribute name when the data belongs to a fragment.
    fn normalize(
        &self,
        shape: &ModelShape,
        raw: &Value,
        key: Option<&str>,
    ) -> Result<Normalized, ModelError>;

    /// Convert one stored value back into wire format.
    fn serialize_attribute(
        &self,
        shape: &ModelShape,
        decl: &AttributeDecl,
        value: &Value,
    ) -> Result<Value, ModelError>;
}
