//! Lifecycle events understood by the record/fragment state graph.

use std::fmt;
use std::str::FromStr;

use crate::error::StateError;

/// An event delivered to a state machine via `send`.
///
/// Wire names follow the camel-cased event names used by persistence
/// adapters (`pushedData`, `willCommit`, ...), so adapters that speak in
/// strings can parse them with [`Event::from_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Event {
    /// External (persisted) data was applied.
    PushedData,
    /// A brand-new entity was populated locally.
    LoadedData,
    /// A local attribute write.
    DidSetProperty,
    /// The last outstanding local change was undone.
    PropertyWasReset,
    /// An owned fragment or fragment collection reported dirty.
    BecameDirty,
    /// A save was started.
    WillCommit,
    /// The adapter acknowledged the save.
    DidCommit,
    /// The adapter reported a failed save.
    BecameError,
    /// Local changes were discarded.
    RolledBack,
    /// Deletion was requested.
    DeleteRecord,
}

impl Event {
    pub const ALL: [Event; 10] = [
        Event::PushedData,
        Event::LoadedData,
        Event::DidSetProperty,
        Event::PropertyWasReset,
        Event::BecameDirty,
        Event::WillCommit,
        Event::DidCommit,
        Event::BecameError,
        Event::RolledBack,
        Event::DeleteRecord,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Event::PushedData => "pushedData",
            Event::LoadedData => "loadedData",
            Event::DidSetProperty => "didSetProperty",
            Event::PropertyWasReset => "propertyWasReset",
            Event::BecameDirty => "becameDirty",
            Event::WillCommit => "willCommit",
            Event::DidCommit => "didCommit",
            Event::BecameError => "becameError",
            Event::RolledBack => "rolledBack",
            Event::DeleteRecord => "deleteRecord",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Event {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Event::ALL
            .iter()
            .find(|e| e.as_str() == s)
            .copied()
            .ok_or_else(|| StateError::UnknownEvent(s.to_string()))
    }
}
