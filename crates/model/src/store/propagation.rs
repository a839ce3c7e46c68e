//! Dirty-state propagation up the owner chain.

use tessera_state::Event;

use super::Store;
use crate::entity::FragmentSlot;
use crate::error::ModelError;
use crate::record::{EntityRef, FragmentId};

impl Store {
    /// Bring `target`'s state in line with its data, then notify its owner
    /// chain.
    pub(crate) fn propagate(&mut self, target: EntityRef, dirty_event: Event) -> Result<(), ModelError> {
        self.sync_state(target, dirty_event)?;
        if let EntityRef::Fragment(fragment) = target {
            self.notify_owner(fragment)?;
        }
        Ok(())
    }

    /// Tell a fragment's owner whether the fragment is now dirty or clean.
    /// Detached fragments have nobody to tell.
    pub(crate) fn notify_owner(&mut self, fragment: FragmentId) -> Result<(), ModelError> {
        let f = self.fragment(fragment)?;
        let (Some(owner), Some(name)) = (f.owner, f.name.clone()) else {
            return Ok(());
        };
        if self.is_dirty(fragment)? {
            self.fragment_did_dirty(owner, &name, Some(fragment))
        } else {
            self.fragment_did_reset(owner, &name, Some(fragment))
        }
    }

    /// A fragment held in `name` became dirty, or the slot's membership
    /// changed. The owner turns dirty and passes the news upward.
    pub fn fragment_did_dirty(
        &mut self,
        owner: impl Into<EntityRef>,
        name: &str,
        fragment: Option<FragmentId>,
    ) -> Result<(), ModelError> {
        let owner = owner.into();
        self.slot(owner, name)?;
        tracing::trace!(%owner, attribute = name, fragment = ?fragment, "fragment dirtied");
        self.propagate(owner, Event::BecameDirty)
    }

    /// A fragment held in `name` returned to its persisted values. The owner
    /// becomes clean only if nothing else about it is dirty.
    pub fn fragment_did_reset(
        &mut self,
        owner: impl Into<EntityRef>,
        name: &str,
        fragment: Option<FragmentId>,
    ) -> Result<(), ModelError> {
        let owner = owner.into();
        self.slot(owner, name)?;
        tracing::trace!(%owner, attribute = name, fragment = ?fragment, "fragment reset");
        self.propagate(owner, Event::BecameDirty)
    }

    /// Send `dirty_event` or `propertyWasReset` if the entity's dirty flag
    /// disagrees with its data. States that handle neither are left alone,
    /// so in-flight and deleted entities keep their state.
    pub(crate) fn sync_state(&mut self, target: EntityRef, dirty_event: Event) -> Result<(), ModelError> {
        let changed = self.has_changes(target)?;
        let state = self.entity(target)?.state;
        let flagged = self.machine.flags(state).is_dirty;

        if changed && !flagged && self.machine.accepts(state, dirty_event) {
            self.send(target, dirty_event)?;
        } else if !changed && flagged && self.machine.accepts(state, Event::PropertyWasReset) {
            self.send(target, Event::PropertyWasReset)?;
        }
        Ok(())
    }

    /// True if the entity has an uncommitted attribute change or any of its
    /// fragment slots is dirty.
    pub fn has_changes(&self, target: impl Into<EntityRef>) -> Result<bool, ModelError> {
        let entity = self.entity(target)?;
        if entity.has_dirty_attributes() {
            return Ok(true);
        }
        for slot in entity.slots.values() {
            if self.slot_is_dirty(slot)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub(crate) fn slot_is_dirty(&self, slot: &FragmentSlot) -> Result<bool, ModelError> {
        match slot {
            FragmentSlot::One(r) => {
                if r.is_replaced() {
                    return Ok(true);
                }
                match r.current {
                    Some(fragment) => self.is_dirty(fragment),
                    None => Ok(false),
                }
            }
            FragmentSlot::Many(array) => {
                if array.membership_changed() {
                    return Ok(true);
                }
                for fragment in array.iter() {
                    if self.is_dirty(fragment)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }
}
