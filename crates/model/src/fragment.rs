//! Owner-bound nested objects.

use crate::entity::StatefulEntity;
use crate::record::{EntityRef, FragmentId};

/// A nested object bound to exactly one owner for its whole lifetime.
///
/// Fragments have no identity or persistence of their own: committing or
/// rolling back the owner cascades into them. A fragment created through
/// [`Store::create_fragment`](crate::Store::create_fragment) or
/// [`Store::copy`](crate::Store::copy) starts detached; the first
/// attachment binds its owner and attribute name permanently.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub(crate) handle: FragmentId,
    pub(crate) model: String,
    pub(crate) owner: Option<EntityRef>,
    pub(crate) name: Option<String>,
    pub(crate) entity: StatefulEntity,
}

impl Fragment {
    pub fn handle(&self) -> FragmentId {
        self.handle
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn owner(&self) -> Option<EntityRef> {
        self.owner
    }

    /// Attribute name on the owner.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn entity(&self) -> &StatefulEntity {
        &self.entity
    }
}

/// Identity comparison: `0` for the same fragment instance, non-zero
/// otherwise. Content never makes two fragments equal, so collection diffs
/// treat each instance as a distinct element.
pub fn compare(a: FragmentId, b: FragmentId) -> i32 {
    if a == b {
        0
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_is_identity_only() {
        assert_eq!(compare(FragmentId(3), FragmentId(3)), 0);
        assert_ne!(compare(FragmentId(3), FragmentId(4)), 0);
    }
}
