use std::fmt;

use crate::entity::StatefulEntity;

/// Arena handle for a top-level record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(pub(crate) u64);

/// Arena handle for a fragment. Two handles are equal only if they name the
/// same fragment instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FragmentId(pub(crate) u64);

/// Non-owning reference to anything that can own fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityRef {
    Record(RecordId),
    Fragment(FragmentId),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record#{}", self.0)
    }
}

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fragment#{}", self.0)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Record(id) => id.fmt(f),
            EntityRef::Fragment(id) => id.fmt(f),
        }
    }
}

impl From<RecordId> for EntityRef {
    fn from(id: RecordId) -> Self {
        EntityRef::Record(id)
    }
}

impl From<FragmentId> for EntityRef {
    fn from(id: FragmentId) -> Self {
        EntityRef::Fragment(id)
    }
}

/// A top-level record: the only kind of entity with its own identity.
#[derive(Debug, Clone)]
pub struct Record {
    pub(crate) handle: RecordId,
    pub(crate) model: String,
    /// Wire identifier. `None` until assigned for newly created records.
    pub(crate) id: Option<String>,
    pub(crate) entity: StatefulEntity,
}

impl Record {
    pub fn handle(&self) -> RecordId {
        self.handle
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn entity(&self) -> &StatefulEntity {
        &self.entity
    }
}
