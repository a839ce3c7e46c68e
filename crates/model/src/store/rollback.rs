use tessera_state::Event;

use super::Store;
use crate::entity::FragmentSlot;
use crate::error::ModelError;
use crate::record::{EntityRef, FragmentId};

impl Store {
    /// Discard every uncommitted change on `target` and, recursively, on
    /// every fragment it holds. Rolling back a clean entity is a no-op.
    pub fn rollback(&mut self, target: impl Into<EntityRef>) -> Result<(), ModelError> {
        let target = target.into();
        self.rollback_entity(target)?;
        tracing::debug!(%target, state = self.state_path(target)?, "rolled back");
        if let EntityRef::Fragment(fragment) = target {
            self.notify_owner(fragment)?;
        }
        Ok(())
    }

    /// Restore only `owner`'s fragment slots to their persisted values,
    /// leaving its plain attributes alone.
    pub fn rollback_fragments(&mut self, owner: impl Into<EntityRef>) -> Result<(), ModelError> {
        let owner = owner.into();
        self.rollback_slots(owner)?;
        self.propagate(owner, Event::BecameDirty)
    }

    fn rollback_entity(&mut self, target: EntityRef) -> Result<(), ModelError> {
        self.rollback_slots(target)?;
        let state = self.entity(target)?.state;
        if self.machine.accepts(state, Event::RolledBack) {
            self.send(target, Event::RolledBack)?;
        } else if self.in_orphaned_flight(target)? {
            self.entity_mut(target)?.attributes.clear();
            self.settle_flight(target)?;
        } else {
            self.entity_mut(target)?.attributes.clear();
            self.sync_state(target, Event::BecameDirty)?;
        }
        Ok(())
    }

    /// A fragment still marked saving although no save of its owner is
    /// pending.
    fn in_orphaned_flight(&self, target: EntityRef) -> Result<bool, ModelError> {
        let EntityRef::Fragment(fragment) = target else {
            return Ok(false);
        };
        if !self.flags(target)?.is_saving {
            return Ok(false);
        }
        match self.fragment(fragment)?.owner {
            Some(owner) => Ok(!self.flags(owner)?.is_saving),
            None => Ok(true),
        }
    }

    /// Roll back every fragment a slot references, then restore the slot.
    ///
    /// Arrays roll back their current members in order, then any persisted
    /// member that was removed. Has-one slots roll back the current fragment
    /// and the persisted one if it was replaced.
    fn rollback_slots(&mut self, owner: EntityRef) -> Result<(), ModelError> {
        for name in self.slot_names(owner)? {
            let affected: Vec<FragmentId> = match self.slot(owner, &name)? {
                FragmentSlot::One(r) => r
                    .current()
                    .into_iter()
                    .chain(r.canonical().filter(|_| r.is_replaced()))
                    .collect(),
                FragmentSlot::Many(array) => {
                    let mut affected = array.members().to_vec();
                    for fragment in array.canonical().unwrap_or(&[]) {
                        if !affected.contains(fragment) {
                            affected.push(*fragment);
                        }
                    }
                    affected
                }
            };

            for fragment in affected {
                self.rollback_entity(EntityRef::Fragment(fragment))?;
            }

            match self.slot_mut(owner, &name)? {
                FragmentSlot::One(r) => r.current = r.canonical,
                FragmentSlot::Many(array) => array.rollback(),
            }
        }
        Ok(())
    }
}
