//! Wire output, change reports and fragment copies.

use serde_json::{Map, Value};
use tessera_schema::AttributeKind;
use tessera_state::Event;

use super::Store;
use crate::changes::{AttributeChange, ChangeSet, FragmentChange};
use crate::entity::FragmentSlot;
use crate::error::ModelError;
use crate::record::{EntityRef, FragmentId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Emit the record's wire id as `id`. Ignored for fragments.
    pub include_id: bool,
}

impl Store {
    /// Wire representation of `target` with nested fragments inlined.
    ///
    /// A `null` collection serializes as `null`, never as an empty array.
    pub fn serialize(&self, target: impl Into<EntityRef>, options: SerializeOptions) -> Result<Value, ModelError> {
        let target = target.into();
        let shape = self.shape_of(target)?;
        let serializer = self.serializer_for(&shape.id);
        let entity = self.entity(target)?;

        let mut out = Map::new();
        if let (true, EntityRef::Record(record)) = (options.include_id, target) {
            if let Some(id) = self.record(record)?.id() {
                out.insert("id".to_string(), Value::String(id.to_string()));
            }
        }

        for decl in shape.fields() {
            let value = match &decl.kind {
                AttributeKind::Attr { default, .. } => {
                    let value = entity
                        .read(&decl.name)
                        .or(default.as_ref())
                        .unwrap_or(&Value::Null);
                    serializer.serialize_attribute(shape, decl, value)?
                }
                AttributeKind::BelongsTo { .. } | AttributeKind::HasMany { .. } => {
                    let value = entity.read(&decl.name).unwrap_or(&Value::Null);
                    serializer.serialize_attribute(shape, decl, value)?
                }
                AttributeKind::Fragment { .. } => match entity.slot(&decl.name) {
                    Some(FragmentSlot::One(r)) => match r.current() {
                        Some(fragment) => self.serialize(fragment, SerializeOptions::default())?,
                        None => Value::Null,
                    },
                    _ => Value::Null,
                },
                AttributeKind::FragmentArray { .. } => match entity.slot(&decl.name) {
                    Some(FragmentSlot::Many(array)) if !array.is_null() => Value::Array(
                        array
                            .iter()
                            .map(|fragment| self.serialize(fragment, SerializeOptions::default()))
                            .collect::<Result<Vec<_>, _>>()?,
                    ),
                    _ => Value::Null,
                },
            };
            out.insert(decl.name.clone(), value);
        }
        Ok(Value::Object(out))
    }

    /// Uncommitted changes on `target`: its own attributes and, separately,
    /// every fragment slot that is replaced, reshaped or holds a dirty
    /// fragment.
    pub fn changed_attributes(&self, target: impl Into<EntityRef>) -> Result<ChangeSet, ModelError> {
        let entity = self.entity(target)?;
        let mut changes = ChangeSet::default();

        for (name, after) in &entity.attributes {
            changes.attributes.insert(
                name.clone(),
                AttributeChange {
                    before: entity.baseline(name).clone(),
                    after: after.clone(),
                },
            );
        }

        for (name, slot) in &entity.slots {
            match slot {
                FragmentSlot::One(r) => {
                    let dirty = match r.current() {
                        Some(fragment) => self.is_dirty(fragment)?,
                        None => false,
                    };
                    if r.is_replaced() || dirty {
                        changes.fragments.insert(
                            name.clone(),
                            FragmentChange::Fragment {
                                before: r.canonical(),
                                after: r.current(),
                                dirty,
                            },
                        );
                    }
                }
                FragmentSlot::Many(array) => {
                    let diff = array.diff();
                    let mut dirty_members = Vec::new();
                    for fragment in array.iter() {
                        if self.is_dirty(fragment)? {
                            dirty_members.push(fragment);
                        }
                    }
                    if !diff.is_empty() || !dirty_members.is_empty() {
                        changes
                            .fragments
                            .insert(name.clone(), FragmentChange::Array { diff, dirty_members });
                    }
                }
            }
        }
        Ok(changes)
    }

    /// A new, detached fragment of the same model holding the source's
    /// current plain attribute values as persisted data.
    ///
    /// The copy is shallow: its own fragment slots start `null`.
    pub fn copy(&mut self, fragment: FragmentId) -> Result<FragmentId, ModelError> {
        let source = self.fragment(fragment)?;
        let model = source.model.clone();
        let mut data = source.entity.data.clone();
        data.extend(source.entity.in_flight.clone());
        data.extend(source.entity.attributes.clone());

        let copy = self.alloc_fragment(&model)?;
        self.entity_mut(EntityRef::Fragment(copy))?.data = data;
        self.send(copy, Event::PushedData)?;
        tracing::debug!(source = %fragment, %copy, "fragment copied");
        Ok(copy)
    }
}
