//! Change reporting for `changed_attributes`.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::fragment_array::ArrayDiff;
use crate::record::FragmentId;

/// One plain attribute's uncommitted change.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeChange {
    pub before: Value,
    pub after: Value,
}

/// One fragment-valued attribute's uncommitted change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentChange {
    /// A `fragment` attribute was replaced, or its fragment carries changes.
    Fragment {
        before: Option<FragmentId>,
        after: Option<FragmentId>,
        /// The current fragment is itself dirty.
        dirty: bool,
    },
    /// A `fragmentArray` attribute's membership and/or members changed.
    Array {
        diff: ArrayDiff,
        /// Current members that are themselves dirty, in order.
        dirty_members: Vec<FragmentId>,
    },
}

/// Own attribute changes and fragment changes, reported side by side.
///
/// When both an owner's plain attributes and its fragments are dirty,
/// neither set shadows the other.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub attributes: BTreeMap<String, AttributeChange>,
    pub fragments: BTreeMap<String, FragmentChange>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.fragments.is_empty()
    }
}
