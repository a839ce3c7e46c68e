//! tessera-schema: declared model shapes.
//!
//! Provides typed structs for record models and fragment models, a
//! `from_schema()` entry point that deserializes a `serde_json::Value`
//! bundle into a [`SchemaBundle`], and the [`Schema`] registry the store
//! uses to resolve `model_for` lookups and enumerate attributes.

pub mod deserialize;
pub mod registry;
pub mod types;

pub use deserialize::{from_schema, SchemaError};
pub use registry::{ModelShape, Schema};
pub use types::*;
