//! The record/fragment lifecycle graph.
//!
//! ```text
//! root
//! ├── empty
//! ├── loaded
//! │   ├── saved
//! │   ├── updated
//! │   │   ├── uncommitted
//! │   │   └── inFlight
//! │   └── created
//! │       ├── uncommitted
//! │       └── inFlight
//! └── deleted
//!     ├── uncommitted
//!     ├── inFlight
//!     └── saved        (terminal)
//! ```

use crate::error::StateError;
use crate::event::Event;
use crate::machine::{StateMachine, Stateful, UnhandledPolicy};

pub const ROOT: &str = "root";
pub const EMPTY: &str = "root.empty";
pub const LOADED: &str = "root.loaded";
pub const SAVED: &str = "root.loaded.saved";
pub const UPDATED: &str = "root.loaded.updated";
pub const UPDATED_UNCOMMITTED: &str = "root.loaded.updated.uncommitted";
pub const UPDATED_IN_FLIGHT: &str = "root.loaded.updated.inFlight";
pub const CREATED: &str = "root.loaded.created";
pub const CREATED_UNCOMMITTED: &str = "root.loaded.created.uncommitted";
pub const CREATED_IN_FLIGHT: &str = "root.loaded.created.inFlight";
pub const DELETED: &str = "root.deleted";
pub const DELETED_UNCOMMITTED: &str = "root.deleted.uncommitted";
pub const DELETED_IN_FLIGHT: &str = "root.deleted.inFlight";
pub const DELETED_SAVED: &str = "root.deleted.saved";

/// Capabilities the lifecycle hooks need from an entity.
pub trait LifecycleContext: Stateful {
    /// Move the local overlay into the in-flight map.
    fn capture_in_flight(&mut self);
    /// Fold the in-flight map back under the local overlay.
    fn restore_in_flight(&mut self);
    /// Drop the local overlay.
    fn discard_overlay(&mut self);
    /// Drop the overlay and the in-flight map.
    fn discard_all(&mut self);
}

fn capture<C: LifecycleContext>(ctx: &mut C) {
    ctx.capture_in_flight();
}

fn restore<C: LifecycleContext>(ctx: &mut C) {
    ctx.restore_in_flight();
}

fn discard<C: LifecycleContext>(ctx: &mut C) {
    ctx.discard_overlay();
}

fn discard_all<C: LifecycleContext>(ctx: &mut C) {
    ctx.discard_all();
}

/// Build the lifecycle graph shared by records and fragments.
///
/// Call once at store construction; the result holds no entity state.
pub fn build_lifecycle<C: LifecycleContext>(
    default_policy: UnhandledPolicy,
) -> Result<StateMachine<C>, StateError> {
    StateMachine::builder()
        .default_policy(default_policy)
        .node(ROOT, |n| n)
        .node(EMPTY, |n| {
            n.empty(true)
                .on(Event::PushedData, SAVED)
                .on(Event::LoadedData, CREATED_UNCOMMITTED)
                .on(Event::DeleteRecord, DELETED_UNCOMMITTED)
        })
        .node(LOADED, |n| {
            n.loaded(true)
                .on(Event::PushedData, SAVED)
                .on(Event::DeleteRecord, DELETED_UNCOMMITTED)
        })
        .node(SAVED, |n| {
            n.on(Event::DidSetProperty, UPDATED_UNCOMMITTED)
                .on(Event::BecameDirty, UPDATED_UNCOMMITTED)
                .on(Event::WillCommit, UPDATED_IN_FLIGHT)
        })
        .node(UPDATED, |n| n.dirty(true))
        .node(UPDATED_UNCOMMITTED, |n| {
            n.on(Event::DidSetProperty, UPDATED_UNCOMMITTED)
                .on(Event::BecameDirty, UPDATED_UNCOMMITTED)
                .on(Event::PropertyWasReset, SAVED)
                .on(Event::WillCommit, UPDATED_IN_FLIGHT)
                .on_with(Event::RolledBack, SAVED, discard::<C>)
        })
        .node(UPDATED_IN_FLIGHT, |n| {
            n.saving(true)
                .enter(capture::<C>)
                .on(Event::DidSetProperty, UPDATED_IN_FLIGHT)
                .on(Event::BecameDirty, UPDATED_IN_FLIGHT)
                .on(Event::DidCommit, SAVED)
                .on_with(Event::BecameError, UPDATED_UNCOMMITTED, restore::<C>)
        })
        .node(CREATED, |n| n.dirty(true).new_record(true))
        .node(CREATED_UNCOMMITTED, |n| {
            n.on(Event::DidSetProperty, CREATED_UNCOMMITTED)
                .on(Event::BecameDirty, CREATED_UNCOMMITTED)
                .on(Event::WillCommit, CREATED_IN_FLIGHT)
                .on_with(Event::RolledBack, DELETED_SAVED, discard_all::<C>)
                .on_with(Event::DeleteRecord, DELETED_SAVED, discard_all::<C>)
        })
        .node(CREATED_IN_FLIGHT, |n| {
            n.saving(true)
                .enter(capture::<C>)
                .on(Event::DidSetProperty, CREATED_IN_FLIGHT)
                .on(Event::BecameDirty, CREATED_IN_FLIGHT)
                .on(Event::DidCommit, SAVED)
                .on_with(Event::BecameError, CREATED_UNCOMMITTED, restore::<C>)
        })
        .node(DELETED, |n| n.deleted(true).dirty(true))
        .node(DELETED_UNCOMMITTED, |n| {
            n.on(Event::WillCommit, DELETED_IN_FLIGHT)
                .on_with(Event::RolledBack, SAVED, discard::<C>)
        })
        .node(DELETED_IN_FLIGHT, |n| {
            n.saving(true)
                .enter(capture::<C>)
                .on(Event::DidCommit, DELETED_SAVED)
                .on_with(Event::BecameError, DELETED_UNCOMMITTED, restore::<C>)
        })
        .node(DELETED_SAVED, |n| {
            n.dirty(false)
                .setup(discard_all::<C>)
                .unhandled(UnhandledPolicy::Reject)
        })
        .build()
}
