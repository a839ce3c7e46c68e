//! The store: an arena of records and fragments sharing one lifecycle
//! machine.
//!
//! Every entity lives in the store and is addressed by handle. Fragments
//! point back at their owner through a non-owning [`EntityRef`], so dirty
//! propagation walks handles instead of references.

mod collection;
mod commit;
mod output;
mod propagation;
mod rollback;

use std::collections::BTreeMap;

use serde_json::Value;
use tessera_schema::{AttributeDecl, AttributeKind, ModelShape, Schema};
use tessera_state::{
    build_lifecycle, lifecycle, Dispatch, Event, StateFlags, StateId, StateMachine,
    TransitionRecord,
};

use crate::config::StoreConfig;
use crate::entity::{FragmentRef, FragmentSlot, StatefulEntity};
use crate::error::ModelError;
use crate::fragment::Fragment;
use crate::fragment_array::FragmentArray;
use crate::record::{EntityRef, FragmentId, Record, RecordId};
use crate::serializer::{relationship_id, relationship_ids, type_name, JsonSerializer};
use crate::traits::Serializer;

pub use output::SerializeOptions;

pub struct Store {
    schema: Schema,
    config: StoreConfig,
    machine: StateMachine<StatefulEntity>,
    empty_state: StateId,
    default_serializer: JsonSerializer,
    serializers: BTreeMap<String, Box<dyn Serializer>>,
    records: BTreeMap<RecordId, Record>,
    fragments: BTreeMap<FragmentId, Fragment>,
    identity: BTreeMap<(String, String), RecordId>,
    next_handle: u64,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("schema", &self.schema.id)
            .field("config", &self.config)
            .field("records", &self.records.len())
            .field("fragments", &self.fragments.len())
            .finish()
    }
}

// ──────────────────────────────────────────────
// Arena access
// ──────────────────────────────────────────────

/// Entity lookup over split field borrows, so callers can hold the machine
/// while mutating an entity.
fn entity_in<'a>(
    records: &'a mut BTreeMap<RecordId, Record>,
    fragments: &'a mut BTreeMap<FragmentId, Fragment>,
    target: EntityRef,
) -> Result<&'a mut StatefulEntity, ModelError> {
    match target {
        EntityRef::Record(id) => records.get_mut(&id).map(|r| &mut r.entity),
        EntityRef::Fragment(id) => fragments.get_mut(&id).map(|f| &mut f.entity),
    }
    .ok_or(ModelError::UnknownEntity(target))
}

/// Empty slots for every fragment-valued attribute of `shape`.
///
/// `empty_arrays` starts collections as empty sequences instead of `null`.
fn new_slots(
    shape: &ModelShape,
    owner: EntityRef,
    empty_arrays: bool,
) -> BTreeMap<String, FragmentSlot> {
    let mut slots = BTreeMap::new();
    for decl in shape.fragment_attributes() {
        let slot = match &decl.kind {
            AttributeKind::FragmentArray { model } => FragmentSlot::Many(FragmentArray::new(
                owner,
                &decl.name,
                model,
                empty_arrays.then(Vec::new),
            )),
            _ => FragmentSlot::One(FragmentRef::default()),
        };
        slots.insert(decl.name.clone(), slot);
    }
    slots
}

impl Store {
    pub fn new(schema: Schema, config: StoreConfig) -> Result<Self, ModelError> {
        let machine = build_lifecycle(config.unhandled_event)?;
        let empty_state = machine
            .lookup(lifecycle::EMPTY)
            .ok_or_else(|| tessera_state::StateError::UnresolvedState {
                from: lifecycle::ROOT.to_string(),
                target: lifecycle::EMPTY.to_string(),
            })?;
        tracing::debug!(schema = %schema.id, policy = ?config.unhandled_event, "store created");
        Ok(Store {
            schema,
            config,
            machine,
            empty_state,
            default_serializer: JsonSerializer,
            serializers: BTreeMap::new(),
            records: BTreeMap::new(),
            fragments: BTreeMap::new(),
            identity: BTreeMap::new(),
            next_handle: 1,
        })
    }

    /// Build a store from a schema JSON bundle and TOML configuration text.
    pub fn from_sources(schema: &Value, config: &str) -> Result<Self, ModelError> {
        Store::new(Schema::from_json(schema)?, StoreConfig::from_toml_str(config)?)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn state_machine(&self) -> &StateMachine<StatefulEntity> {
        &self.machine
    }

    pub fn model_for(&self, name: &str) -> Result<&ModelShape, ModelError> {
        Ok(self.schema.model_for(name)?)
    }

    /// Use `serializer` for every entity of `model`.
    pub fn register_serializer(
        &mut self,
        model: &str,
        serializer: Box<dyn Serializer>,
    ) -> Result<(), ModelError> {
        self.schema.model_for(model)?;
        self.serializers.insert(model.to_string(), serializer);
        Ok(())
    }

    pub fn serializer_for(&self, model: &str) -> &dyn Serializer {
        match self.serializers.get(model) {
            Some(serializer) => serializer.as_ref(),
            None => &self.default_serializer,
        }
    }

    pub fn record(&self, id: RecordId) -> Result<&Record, ModelError> {
        self.records
            .get(&id)
            .ok_or(ModelError::UnknownEntity(EntityRef::Record(id)))
    }

    pub fn fragment(&self, id: FragmentId) -> Result<&Fragment, ModelError> {
        self.fragments
            .get(&id)
            .ok_or(ModelError::UnknownEntity(EntityRef::Fragment(id)))
    }

    /// Look up a record by model and wire id.
    pub fn find_record(&self, model: &str, id: &str) -> Option<RecordId> {
        self.identity
            .get(&(model.to_string(), id.to_string()))
            .copied()
    }

    pub fn entity(&self, target: impl Into<EntityRef>) -> Result<&StatefulEntity, ModelError> {
        let target = target.into();
        match target {
            EntityRef::Record(id) => self.records.get(&id).map(|r| &r.entity),
            EntityRef::Fragment(id) => self.fragments.get(&id).map(|f| &f.entity),
        }
        .ok_or(ModelError::UnknownEntity(target))
    }

    pub(crate) fn entity_mut(&mut self, target: EntityRef) -> Result<&mut StatefulEntity, ModelError> {
        entity_in(&mut self.records, &mut self.fragments, target)
    }

    pub(crate) fn fragment_mut(&mut self, id: FragmentId) -> Result<&mut Fragment, ModelError> {
        self.fragments
            .get_mut(&id)
            .ok_or(ModelError::UnknownEntity(EntityRef::Fragment(id)))
    }

    pub(crate) fn model_name(&self, target: EntityRef) -> Result<&str, ModelError> {
        match target {
            EntityRef::Record(id) => Ok(self.record(id)?.model()),
            EntityRef::Fragment(id) => Ok(self.fragment(id)?.model()),
        }
    }

    pub(crate) fn shape_of(&self, target: EntityRef) -> Result<&ModelShape, ModelError> {
        let model = self.model_name(target)?;
        Ok(self.schema.model_for(model)?)
    }

    pub(crate) fn decl(&self, target: EntityRef, name: &str) -> Result<&AttributeDecl, ModelError> {
        let shape = self.shape_of(target)?;
        shape
            .attribute(name)
            .ok_or_else(|| ModelError::UnknownAttribute {
                model: shape.id.clone(),
                attribute: name.to_string(),
            })
    }

    fn bump_handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    // ──────────────────────────────────────────────
    // Lifecycle
    // ──────────────────────────────────────────────

    /// Deliver a lifecycle event to one entity. No propagation.
    pub fn send(&mut self, target: impl Into<EntityRef>, event: Event) -> Result<Dispatch, ModelError> {
        let entity = entity_in(&mut self.records, &mut self.fragments, target.into())?;
        Ok(self.machine.send(event, entity)?)
    }

    /// Force one entity into the state at `path`, resolved relative to its
    /// current state.
    pub fn transition_to(
        &mut self,
        target: impl Into<EntityRef>,
        path: &str,
    ) -> Result<TransitionRecord, ModelError> {
        let entity = entity_in(&mut self.records, &mut self.fragments, target.into())?;
        Ok(self.machine.transition_to(path, entity)?)
    }

    pub fn flags(&self, target: impl Into<EntityRef>) -> Result<StateFlags, ModelError> {
        Ok(self.machine.flags(self.entity(target)?.state))
    }

    pub fn state_path(&self, target: impl Into<EntityRef>) -> Result<&str, ModelError> {
        Ok(self.machine.path(self.entity(target)?.state))
    }

    pub fn is_dirty(&self, target: impl Into<EntityRef>) -> Result<bool, ModelError> {
        Ok(self.flags(target)?.is_dirty)
    }

    pub(crate) fn is_within(&self, target: EntityRef, path: &str) -> Result<bool, ModelError> {
        Ok(self.machine.is_within(self.entity(target)?.state, path))
    }

    /// Writes to a terminal entity go through the machine so its reject
    /// policy surfaces as an error.
    pub(crate) fn ensure_writable(&mut self, target: EntityRef) -> Result<(), ModelError> {
        if self.is_within(target, lifecycle::DELETED_SAVED)? {
            self.send(target, Event::DidSetProperty)?;
        }
        Ok(())
    }

    // ──────────────────────────────────────────────
    // Creation and loading
    // ──────────────────────────────────────────────

    fn insert_record(
        &mut self,
        model: &str,
        id: Option<String>,
        empty_arrays: bool,
    ) -> Result<RecordId, ModelError> {
        let handle = RecordId(self.bump_handle());
        let shape = self.schema.model_for(model)?;
        if shape.is_fragment() {
            return Err(ModelError::ModelKind {
                model: model.to_string(),
                expected: "record",
            });
        }
        let slots = new_slots(shape, EntityRef::Record(handle), empty_arrays);
        self.records.insert(
            handle,
            Record {
                handle,
                model: model.to_string(),
                id,
                entity: StatefulEntity::new(self.empty_state, slots),
            },
        );
        Ok(handle)
    }

    pub(crate) fn alloc_fragment(&mut self, model: &str) -> Result<FragmentId, ModelError> {
        let handle = FragmentId(self.bump_handle());
        let shape = self.schema.model_for(model)?;
        if !shape.is_fragment() {
            return Err(ModelError::ModelKind {
                model: model.to_string(),
                expected: "fragment",
            });
        }
        let slots = new_slots(shape, EntityRef::Fragment(handle), false);
        self.fragments.insert(
            handle,
            Fragment {
                handle,
                model: model.to_string(),
                owner: None,
                name: None,
                entity: StatefulEntity::new(self.empty_state, slots),
            },
        );
        Ok(handle)
    }

    /// Load persisted wire data for a record, creating it on first sight.
    ///
    /// Pushing the same model and id again replaces the persisted data and
    /// discards local changes, reusing existing fragments by position.
    pub fn push(&mut self, model: &str, raw: &Value) -> Result<RecordId, ModelError> {
        if self.schema.model_for(model)?.is_fragment() {
            return Err(ModelError::ModelKind {
                model: model.to_string(),
                expected: "record",
            });
        }
        let id = match raw.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Err(ModelError::MissingId {
                    model: model.to_string(),
                })
            }
        };

        let key = (model.to_string(), id.clone());
        let handle = match self.identity.get(&key) {
            Some(handle) => *handle,
            None => {
                let handle = self.insert_record(model, Some(id), false)?;
                self.identity.insert(key, handle);
                handle
            }
        };
        self.setup_entity(EntityRef::Record(handle), raw)?;
        tracing::debug!(model, record = %handle, "pushed record");
        Ok(handle)
    }

    /// A new, unsaved record. Collections start empty rather than `null`.
    pub fn create_record(&mut self, model: &str, id: Option<&str>) -> Result<RecordId, ModelError> {
        if let Some(id) = id {
            if self.find_record(model, id).is_some() {
                return Err(ModelError::DuplicateRecord {
                    model: model.to_string(),
                    id: id.to_string(),
                });
            }
        }
        let handle = self.insert_record(model, id.map(str::to_string), true)?;
        if let Some(id) = id {
            self.identity
                .insert((model.to_string(), id.to_string()), handle);
        }
        self.send(handle, Event::LoadedData)?;
        tracing::debug!(model, record = %handle, "created record");
        Ok(handle)
    }

    /// A detached fragment loaded from `raw`. It binds to an owner on its
    /// first attachment.
    pub fn create_fragment(&mut self, model: &str, raw: &Value) -> Result<FragmentId, ModelError> {
        let fragment = self.alloc_fragment(model)?;
        self.setup_entity(EntityRef::Fragment(fragment), raw)?;
        Ok(fragment)
    }

    /// Replace an entity's persisted data with `raw` and tell its owner.
    pub fn setup_data(&mut self, target: impl Into<EntityRef>, raw: &Value) -> Result<(), ModelError> {
        let target = target.into();
        self.setup_entity(target, raw)?;
        if let EntityRef::Fragment(fragment) = target {
            self.notify_owner(fragment)?;
        }
        Ok(())
    }

    /// Load `raw` into `target` without notifying its owner.
    pub(crate) fn setup_entity(&mut self, target: EntityRef, raw: &Value) -> Result<(), ModelError> {
        let shape = self.shape_of(target)?;
        let key = match target {
            EntityRef::Fragment(id) => self.fragment(id)?.name.as_deref(),
            EntityRef::Record(_) => None,
        };
        let normalized = self.serializer_for(&shape.id).normalize(shape, raw, key)?;
        let decls: Vec<AttributeDecl> = shape.fragment_attributes().cloned().collect();

        {
            let entity = self.entity_mut(target)?;
            entity.data = normalized.attributes;
            entity.attributes.clear();
            entity.in_flight.clear();
        }

        for decl in &decls {
            let payload = normalized.fragments.get(&decl.name).unwrap_or(&Value::Null);
            match &decl.kind {
                AttributeKind::Fragment { model } => {
                    self.setup_one(target, &decl.name, model, payload)?
                }
                AttributeKind::FragmentArray { model } => {
                    self.setup_many(target, &decl.name, model, payload)?
                }
                _ => {}
            }
        }

        self.send(target, Event::PushedData)?;
        Ok(())
    }

    fn setup_one(
        &mut self,
        owner: EntityRef,
        name: &str,
        model: &str,
        payload: &Value,
    ) -> Result<(), ModelError> {
        let (existing, previous) = match self.slot(owner, name)? {
            FragmentSlot::One(r) => {
                let previous: Vec<FragmentId> = [r.current, r.in_flight.flatten()]
                    .into_iter()
                    .flatten()
                    .collect();
                (r.canonical, previous)
            }
            FragmentSlot::Many(_) => (None, Vec::new()),
        };
        let next = if payload.is_null() {
            None
        } else {
            let fragment = match existing {
                Some(fragment) => fragment,
                None => {
                    let fragment = self.alloc_fragment(model)?;
                    self.claim(fragment, owner, name)?;
                    fragment
                }
            };
            self.setup_entity(EntityRef::Fragment(fragment), payload)?;
            Some(fragment)
        };
        if let FragmentSlot::One(r) = self.slot_mut(owner, name)? {
            *r = FragmentRef {
                current: next,
                canonical: next,
                in_flight: None,
            };
        }
        self.settle_displaced(&previous, next.as_slice())
    }

    fn setup_many(
        &mut self,
        owner: EntityRef,
        name: &str,
        model: &str,
        payload: &Value,
    ) -> Result<(), ModelError> {
        let (existing, previous) = match self.slot(owner, name)? {
            FragmentSlot::Many(a) => (
                a.canonical().map(<[_]>::to_vec).unwrap_or_default(),
                [a.members(), a.flight_members()].concat(),
            ),
            FragmentSlot::One(_) => (Vec::new(), Vec::new()),
        };
        let next = match payload {
            Value::Null => None,
            Value::Array(items) => {
                let mut members = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    let fragment = match existing.get(index) {
                        Some(fragment) => *fragment,
                        None => {
                            let fragment = self.alloc_fragment(model)?;
                            self.claim(fragment, owner, name)?;
                            fragment
                        }
                    };
                    self.setup_entity(EntityRef::Fragment(fragment), item)?;
                    members.push(fragment);
                }
                Some(members)
            }
            other => {
                return Err(ModelError::InvalidPayload {
                    model: self.model_name(owner)?.to_string(),
                    message: format!("expected an array for '{}', got {}", name, type_name(other)),
                })
            }
        };
        let kept = next.clone().unwrap_or_default();
        self.array_mut(owner, name)?.reset(next);
        self.settle_displaced(&previous, &kept)
    }

    /// Fragments a push dropped from a slot can no longer be acknowledged
    /// with their owner.
    fn settle_displaced(&mut self, previous: &[FragmentId], kept: &[FragmentId]) -> Result<(), ModelError> {
        for fragment in previous {
            if !kept.contains(fragment) && self.flags(*fragment)?.is_saving {
                self.settle_flight(EntityRef::Fragment(*fragment))?;
            }
        }
        Ok(())
    }

    // ──────────────────────────────────────────────
    // Plain attributes
    // ──────────────────────────────────────────────

    /// Current value of a plain attribute or relationship.
    ///
    /// Unset attributes fall back to their declared default, then `null`.
    pub fn get(&self, target: impl Into<EntityRef>, name: &str) -> Result<Value, ModelError> {
        let target = target.into();
        let decl = self.decl(target, name)?;
        let entity = self.entity(target)?;
        match &decl.kind {
            AttributeKind::Attr { default, .. } => Ok(entity
                .read(name)
                .or(default.as_ref())
                .cloned()
                .unwrap_or(Value::Null)),
            AttributeKind::BelongsTo { .. } | AttributeKind::HasMany { .. } => {
                Ok(entity.read(name).cloned().unwrap_or(Value::Null))
            }
            AttributeKind::Fragment { .. } | AttributeKind::FragmentArray { .. } => {
                Err(self.kind_error(target, decl, "attr or relationship"))
            }
        }
    }

    /// Write a plain attribute or relationship and propagate the resulting
    /// dirty state up the owner chain.
    pub fn set(&mut self, target: impl Into<EntityRef>, name: &str, value: Value) -> Result<(), ModelError> {
        let target = target.into();
        let decl = self.decl(target, name)?;
        let coerced = match &decl.kind {
            AttributeKind::Attr { .. } => Some(value.clone()),
            AttributeKind::BelongsTo { .. } => relationship_id(&value),
            AttributeKind::HasMany { .. } => relationship_ids(&value),
            AttributeKind::Fragment { .. } | AttributeKind::FragmentArray { .. } => {
                return Err(self.kind_error(target, decl, "attr or relationship"))
            }
        };
        let Some(value) = coerced else {
            return Err(ModelError::InvalidValue {
                model: self.model_name(target)?.to_string(),
                attribute: name.to_string(),
                message: format!("cannot use {} as a {} value", type_name(&value), decl.kind.as_str()),
            });
        };

        self.ensure_writable(target)?;
        self.entity_mut(target)?.write(name, value);
        tracing::trace!(%target, attribute = name, "attribute set");
        self.propagate(target, Event::DidSetProperty)
    }

    pub(crate) fn kind_error(
        &self,
        target: EntityRef,
        decl: &AttributeDecl,
        expected: &'static str,
    ) -> ModelError {
        ModelError::AttributeKind {
            model: self.model_name(target).unwrap_or_default().to_string(),
            attribute: decl.name.clone(),
            expected,
            actual: decl.kind.as_str(),
        }
    }

    // ──────────────────────────────────────────────
    // Enumeration
    // ──────────────────────────────────────────────

    /// The owner and attribute name a fragment is bound to, if any.
    pub fn owner_of(&self, fragment: FragmentId) -> Result<Option<(EntityRef, &str)>, ModelError> {
        let f = self.fragment(fragment)?;
        Ok(f.owner.zip(f.name.as_deref()))
    }

    /// Visit plain and fragment-valued attributes in declaration order.
    pub fn each_attribute(
        &self,
        target: impl Into<EntityRef>,
        mut callback: impl FnMut(&str, &AttributeDecl),
    ) -> Result<(), ModelError> {
        for decl in self.shape_of(target.into())?.attributes() {
            callback(&decl.name, decl);
        }
        Ok(())
    }

    /// Visit `belongsTo` and `hasMany` declarations in declaration order.
    pub fn each_relationship(
        &self,
        target: impl Into<EntityRef>,
        mut callback: impl FnMut(&str, &AttributeDecl),
    ) -> Result<(), ModelError> {
        for decl in self.shape_of(target.into())?.relationships() {
            callback(&decl.name, decl);
        }
        Ok(())
    }
}
