//! Save cascades: `willCommit`, acknowledgement and failure.
//!
//! Fragments are persisted with their owner, so each step walks the owner's
//! slots and repeats itself on every fragment they hold. Acknowledgement and
//! failure also reach fragments removed after the save started.

use tessera_state::{lifecycle, Event};

use super::Store;
use crate::entity::FragmentSlot;
use crate::error::ModelError;
use crate::record::{EntityRef, FragmentId, RecordId};

impl Store {
    /// A save of `record` has started.
    pub fn will_commit(&mut self, record: RecordId) -> Result<(), ModelError> {
        self.record(record)?;
        self.will_commit_entity(EntityRef::Record(record))?;
        tracing::debug!(%record, "save started");
        Ok(())
    }

    /// The save was acknowledged: in-flight values become persisted data,
    /// the entity is forced back to `saved`, and the same happens for every
    /// fragment it holds.
    pub fn adapter_did_commit(&mut self, target: impl Into<EntityRef>) -> Result<(), ModelError> {
        let target = target.into();
        self.did_commit_entity(target)?;
        tracing::debug!(%target, state = self.state_path(target)?, "save acknowledged");
        if let EntityRef::Fragment(fragment) = target {
            self.notify_owner(fragment)?;
        }
        Ok(())
    }

    /// The save failed. In-flight values return under the local overlay.
    pub fn became_error(&mut self, record: RecordId) -> Result<(), ModelError> {
        self.record(record)?;
        self.became_error_entity(EntityRef::Record(record))?;
        tracing::warn!(%record, "save failed");
        Ok(())
    }

    /// Mark a record for deletion. Unsaved records are discarded outright.
    pub fn delete_record(&mut self, record: RecordId) -> Result<(), ModelError> {
        self.record(record)?;
        self.send(record, Event::DeleteRecord)?;
        tracing::debug!(%record, state = self.state_path(record)?, "record deleted");
        Ok(())
    }

    fn will_commit_entity(&mut self, target: EntityRef) -> Result<(), ModelError> {
        self.send(target, Event::WillCommit)?;
        for name in self.slot_names(target)? {
            let members: Vec<FragmentId> = match self.slot_mut(target, &name)? {
                FragmentSlot::One(r) => {
                    r.in_flight = Some(r.current);
                    r.current.into_iter().collect()
                }
                FragmentSlot::Many(array) => {
                    array.begin_flight();
                    array.members().to_vec()
                }
            };
            for fragment in members {
                self.will_commit_entity(EntityRef::Fragment(fragment))?;
            }
        }
        Ok(())
    }

    fn did_commit_entity(&mut self, target: EntityRef) -> Result<(), ModelError> {
        {
            let entity = self.entity_mut(target)?;
            let in_flight = std::mem::take(&mut entity.in_flight);
            entity.data.extend(in_flight);
        }

        for name in self.slot_names(target)? {
            let members = match self.slot_mut(target, &name)? {
                FragmentSlot::One(r) => {
                    let flown = r.in_flight.take();
                    if let Some(snapshot) = flown {
                        r.canonical = snapshot;
                    }
                    with_flown(r.current.into_iter().collect(), flown.flatten().as_slice())
                }
                FragmentSlot::Many(array) => {
                    let flown = array.flight_members().to_vec();
                    array.finish_flight();
                    with_flown(array.members().to_vec(), &flown)
                }
            };
            for fragment in members {
                self.did_commit_entity(EntityRef::Fragment(fragment))?;
            }
        }

        if !self.is_within(target, lifecycle::EMPTY)? && !self.is_within(target, lifecycle::DELETED_SAVED)? {
            let state = self.entity(target)?.state;
            if self.machine.accepts(state, Event::DidCommit) {
                self.send(target, Event::DidCommit)?;
            } else {
                self.transition_to(target, "saved")?;
            }
        }
        self.sync_state(target, Event::BecameDirty)
    }

    fn became_error_entity(&mut self, target: EntityRef) -> Result<(), ModelError> {
        for name in self.slot_names(target)? {
            let members = match self.slot_mut(target, &name)? {
                FragmentSlot::One(r) => {
                    let flown = r.in_flight.take().flatten();
                    with_flown(r.current.into_iter().collect(), flown.as_slice())
                }
                FragmentSlot::Many(array) => {
                    let flown = array.flight_members().to_vec();
                    array.abort_flight();
                    with_flown(array.members().to_vec(), &flown)
                }
            };
            for fragment in members {
                self.became_error_entity(EntityRef::Fragment(fragment))?;
            }
        }
        // Fragments attached after the save started were never in flight.
        let state = self.entity(target)?.state;
        if matches!(target, EntityRef::Record(_)) || self.machine.accepts(state, Event::BecameError) {
            self.send(target, Event::BecameError)?;
        }
        self.sync_state(target, Event::BecameDirty)
    }

    /// Drop a save that can no longer be acknowledged: the in-flight values
    /// and slot snapshots are discarded and a saving entity returns to
    /// `saved`, along with every saving fragment beneath it.
    pub(crate) fn settle_flight(&mut self, target: EntityRef) -> Result<(), ModelError> {
        self.entity_mut(target)?.in_flight.clear();
        for name in self.slot_names(target)? {
            let members = match self.slot_mut(target, &name)? {
                FragmentSlot::One(r) => {
                    let flown = r.in_flight.take().flatten();
                    with_flown(r.current.into_iter().collect(), flown.as_slice())
                }
                FragmentSlot::Many(array) => {
                    let flown = array.flight_members().to_vec();
                    array.abort_flight();
                    with_flown(array.members().to_vec(), &flown)
                }
            };
            for fragment in members {
                if self.flags(fragment)?.is_saving {
                    self.settle_flight(EntityRef::Fragment(fragment))?;
                }
            }
        }
        if self.flags(target)?.is_saving {
            self.transition_to(target, lifecycle::SAVED)?;
        }
        self.sync_state(target, Event::BecameDirty)
    }
}

/// Current members, then every member the save started with that has since
/// left the slot.
fn with_flown(mut members: Vec<FragmentId>, flown: &[FragmentId]) -> Vec<FragmentId> {
    for fragment in flown {
        if !members.contains(fragment) {
            members.push(*fragment);
        }
    }
    members
}
