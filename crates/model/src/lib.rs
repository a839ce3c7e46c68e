//! tessera-model: records with owner-bound fragments.
//!
//! A [`Store`] holds records and the fragments nested inside them. Writing
//! to a fragment dirties its owner chain; rolling back or committing an
//! owner cascades into every fragment it holds. Fragment collections
//! track membership against their persisted snapshot, so adding and then
//! removing a fragment leaves the owner clean.

mod changes;
mod config;
mod entity;
mod error;
mod fragment;
mod fragment_array;
mod record;
mod serializer;
mod store;
mod traits;

pub use changes::{AttributeChange, ChangeSet, FragmentChange};
pub use config::StoreConfig;
pub use entity::{AttributeMap, FragmentRef, FragmentSlot, StatefulEntity};
pub use error::ModelError;
pub use fragment::{compare, Fragment};
pub use fragment_array::{ArrayDiff, FragmentArray};
pub use record::{EntityRef, FragmentId, Record, RecordId};
pub use serializer::JsonSerializer;
pub use store::{SerializeOptions, Store};
pub use traits::{Normalized, Serializer};

pub use tessera_schema::{AttributeDecl, AttributeKind, ModelShape, Schema};
pub use tessera_state::{Event, StateFlags, UnhandledPolicy};
