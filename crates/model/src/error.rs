use tessera_schema::SchemaError;
use tessera_state::StateError;

use crate::record::{EntityRef, FragmentId};

/// All errors that can be returned by a [`Store`](crate::Store) operation.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Schema lookup or validation failed.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The state machine refused an event or could not resolve a state.
    #[error(transparent)]
    State(#[from] StateError),

    /// The store configuration could not be parsed.
    #[error("invalid store config: {0}")]
    Config(#[from] toml::de::Error),

    /// No entity with this handle lives in the store.
    #[error("unknown entity: {0}")]
    UnknownEntity(EntityRef),

    /// The model declares no attribute with this name.
    #[error("model '{model}' has no attribute '{attribute}'")]
    UnknownAttribute { model: String, attribute: String },

    /// The attribute exists but is the wrong kind for the operation.
    #[error("attribute '{attribute}' on '{model}' is a {actual}, expected {expected}")]
    AttributeKind {
        model: String,
        attribute: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// A record operation was given a fragment model, or the reverse.
    #[error("model '{model}' is not a {expected} model")]
    ModelKind {
        model: String,
        expected: &'static str,
    },

    /// Pushed record data had no usable `id`.
    #[error("cannot push '{model}' without an id")]
    MissingId { model: String },

    /// A record with this model and id already lives in the store.
    #[error("record '{model}' with id '{id}' already exists")]
    DuplicateRecord { model: String, id: String },

    /// The fragment is already bound to a different owner or attribute.
    #[error("fragment {fragment} is owned by {owner} ('{name}'); cannot attach to {attempted} ('{attempted_name}')")]
    OwnershipViolation {
        fragment: FragmentId,
        owner: EntityRef,
        name: String,
        attempted: EntityRef,
        attempted_name: String,
    },

    /// Attaching the fragment would make it (transitively) own itself.
    #[error("fragment {fragment} cannot be attached beneath itself via {owner}")]
    OwnershipCycle {
        fragment: FragmentId,
        owner: EntityRef,
    },

    /// The fragment's model does not match the attribute's declared model.
    #[error("attribute '{attribute}' holds '{expected}' fragments, got a '{actual}'")]
    WrongModel {
        attribute: String,
        expected: String,
        actual: String,
    },

    /// The fragment is already a member of this collection.
    #[error("fragment {fragment} is already in '{attribute}'")]
    DuplicateMember {
        fragment: FragmentId,
        attribute: String,
    },

    /// A collection index was past the end.
    #[error("index {index} out of bounds for '{attribute}' (length {len})")]
    IndexOutOfBounds {
        attribute: String,
        index: usize,
        len: usize,
    },

    /// Raw wire data did not have the expected shape.
    #[error("invalid payload for '{model}': {message}")]
    InvalidPayload { model: String, message: String },

    /// A value written to an attribute did not fit its declaration.
    #[error("invalid value for '{model}.{attribute}': {message}")]
    InvalidValue {
        model: String,
        attribute: String,
        message: String,
    },
}
