//! State shared by records and fragments.
//!
//! Both [`Record`](crate::Record) and [`Fragment`](crate::Fragment) embed a
//! [`StatefulEntity`]: the current lifecycle state, the last-persisted
//! `data`, the uncommitted overlay, the in-flight snapshot and the
//! fragment-valued attribute slots.

use std::collections::BTreeMap;

use serde_json::Value;
use tessera_state::{LifecycleContext, StateId, Stateful};

use crate::fragment_array::FragmentArray;
use crate::record::FragmentId;

/// Attribute name to value.
pub type AttributeMap = BTreeMap<String, Value>;

/// A `fragment` attribute: at most one nested fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentRef {
    pub(crate) current: Option<FragmentId>,
    pub(crate) canonical: Option<FragmentId>,
    /// Outer `Some` while a save is in flight; inner value is the fragment
    /// that was current when the save started.
    pub(crate) in_flight: Option<Option<FragmentId>>,
}

impl FragmentRef {
    pub fn current(&self) -> Option<FragmentId> {
        self.current
    }

    /// The fragment from the last push or acknowledged save.
    pub fn canonical(&self) -> Option<FragmentId> {
        self.canonical
    }

    pub fn is_replaced(&self) -> bool {
        self.current != self.canonical
    }
}

/// Storage for one fragment-valued attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentSlot {
    One(FragmentRef),
    Many(FragmentArray),
}

impl FragmentSlot {
    /// Every fragment the slot currently references, in order.
    pub fn current_members(&self) -> Vec<FragmentId> {
        match self {
            FragmentSlot::One(r) => r.current.into_iter().collect(),
            FragmentSlot::Many(a) => a.members().to_vec(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatefulEntity {
    pub(crate) state: StateId,
    pub(crate) data: AttributeMap,
    pub(crate) attributes: AttributeMap,
    pub(crate) in_flight: AttributeMap,
    pub(crate) slots: BTreeMap<String, FragmentSlot>,
}

impl StatefulEntity {
    pub(crate) fn new(state: StateId, slots: BTreeMap<String, FragmentSlot>) -> Self {
        StatefulEntity {
            state,
            data: AttributeMap::new(),
            attributes: AttributeMap::new(),
            in_flight: AttributeMap::new(),
            slots,
        }
    }

    pub fn state(&self) -> StateId {
        self.state
    }

    /// Last-persisted values.
    pub fn data(&self) -> &AttributeMap {
        &self.data
    }

    /// Uncommitted local changes.
    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    pub fn in_flight(&self) -> &AttributeMap {
        &self.in_flight
    }

    pub fn slot(&self, name: &str) -> Option<&FragmentSlot> {
        self.slots.get(name)
    }

    pub fn has_dirty_attributes(&self) -> bool {
        !self.attributes.is_empty()
    }

    /// Visible value: overlay, then in-flight, then persisted.
    pub fn read(&self, name: &str) -> Option<&Value> {
        self.attributes
            .get(name)
            .or_else(|| self.in_flight.get(name))
            .or_else(|| self.data.get(name))
    }

    /// The value a local write is compared against.
    pub(crate) fn baseline(&self, name: &str) -> &Value {
        self.in_flight
            .get(name)
            .or_else(|| self.data.get(name))
            .unwrap_or(&Value::Null)
    }

    /// Record a local write. Writing the baseline value back removes the key
    /// from the overlay instead of storing a no-op change.
    pub(crate) fn write(&mut self, name: &str, value: Value) {
        if *self.baseline(name) == value {
            self.attributes.remove(name);
        } else {
            self.attributes.insert(name.to_string(), value);
        }
    }
}

impl Stateful for StatefulEntity {
    fn current_state(&self) -> StateId {
        self.state
    }

    fn set_current_state(&mut self, state: StateId) {
        self.state = state;
    }
}

impl LifecycleContext for StatefulEntity {
    fn capture_in_flight(&mut self) {
        let overlay = std::mem::take(&mut self.attributes);
        self.in_flight.extend(overlay);
    }

    fn restore_in_flight(&mut self) {
        for (name, value) in std::mem::take(&mut self.in_flight) {
            self.attributes.entry(name).or_insert(value);
        }
    }

    fn discard_overlay(&mut self) {
        self.attributes.clear();
    }

    fn discard_all(&mut self) {
        self.attributes.clear();
        self.in_flight.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tessera_state::{build_lifecycle, lifecycle, StateMachine, UnhandledPolicy};

    fn saved_entity() -> (StateMachine<StatefulEntity>, StatefulEntity) {
        let machine = build_lifecycle(UnhandledPolicy::Ignore).unwrap();
        let state = machine.lookup(lifecycle::SAVED).unwrap();
        let mut entity = StatefulEntity::new(state, BTreeMap::new());
        entity.data.insert("name".to_string(), json!("A Team"));
        (machine, entity)
    }

    #[test]
    fn writing_back_the_persisted_value_clears_the_overlay() {
        let (_, mut entity) = saved_entity();
        entity.write("name", json!("Z Team"));
        assert!(entity.has_dirty_attributes());
        assert_eq!(entity.read("name"), Some(&json!("Z Team")));

        entity.write("name", json!("A Team"));
        assert!(!entity.has_dirty_attributes());
    }

    #[test]
    fn writing_null_to_absent_key_is_not_a_change() {
        let (_, mut entity) = saved_entity();
        entity.write("coach", Value::Null);
        assert!(!entity.has_dirty_attributes());
    }

    #[test]
    fn reads_prefer_overlay_then_in_flight_then_data() {
        let (machine, mut entity) = saved_entity();
        entity.write("name", json!("In Flight"));
        machine.send(tessera_state::Event::WillCommit, &mut entity).unwrap();
        assert!(entity.attributes().is_empty());
        assert_eq!(entity.read("name"), Some(&json!("In Flight")));

        entity.write("name", json!("Newest"));
        assert_eq!(entity.read("name"), Some(&json!("Newest")));
        assert_eq!(entity.data().get("name"), Some(&json!("A Team")));
    }
}
