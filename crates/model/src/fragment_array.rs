//! Ordered, owner-bound fragment collections and their diffs.

use crate::record::{EntityRef, FragmentId};

/// Difference between a collection's current members and its persisted
/// snapshot. Members are compared by identity and position only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArrayDiff {
    /// Members not present in the snapshot, in current order.
    pub added: Vec<FragmentId>,
    /// Snapshot members no longer present, in snapshot order.
    pub removed: Vec<FragmentId>,
    /// Members present in both appear in a different relative order.
    pub reordered: bool,
    /// The collection went from `null` to a sequence or back.
    pub null_changed: bool,
}

impl ArrayDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && !self.reordered && !self.null_changed
    }
}

/// The fragments held by one `fragmentArray` attribute.
///
/// `None` members mean the attribute is `null`, which is distinct from an
/// empty sequence both for dirty checking and for serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentArray {
    owner: EntityRef,
    name: String,
    model: String,
    members: Option<Vec<FragmentId>>,
    canonical: Option<Vec<FragmentId>>,
    in_flight: Option<Option<Vec<FragmentId>>>,
}

impl FragmentArray {
    pub(crate) fn new(owner: EntityRef, name: &str, model: &str, members: Option<Vec<FragmentId>>) -> Self {
        FragmentArray {
            owner,
            name: name.to_string(),
            model: model.to_string(),
            canonical: members.clone(),
            members,
            in_flight: None,
        }
    }

    pub fn owner(&self) -> EntityRef {
        self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fragment model every member must have.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn is_null(&self) -> bool {
        self.members.is_none()
    }

    pub fn len(&self) -> usize {
        self.members.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn members(&self) -> &[FragmentId] {
        self.members.as_deref().unwrap_or(&[])
    }

    /// Persisted snapshot, `None` if the persisted value was `null`.
    pub fn canonical(&self) -> Option<&[FragmentId]> {
        self.canonical.as_deref()
    }

    pub fn object_at(&self, index: usize) -> Option<FragmentId> {
        self.members().get(index).copied()
    }

    pub fn index_of(&self, fragment: FragmentId) -> Option<usize> {
        self.members().iter().position(|m| *m == fragment)
    }

    pub fn contains(&self, fragment: FragmentId) -> bool {
        self.index_of(fragment).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = FragmentId> + '_ {
        self.members().iter().copied()
    }

    /// True if membership, order or null-ness differs from the snapshot.
    pub fn membership_changed(&self) -> bool {
        self.members != self.canonical
    }

    pub fn diff(&self) -> ArrayDiff {
        let before = self.canonical.as_deref().unwrap_or(&[]);
        let after = self.members();

        let added = after
            .iter()
            .filter(|f| !before.contains(f))
            .copied()
            .collect();
        let removed = before
            .iter()
            .filter(|f| !after.contains(f))
            .copied()
            .collect();

        let kept_before = before.iter().filter(|f| after.contains(f));
        let kept_after = after.iter().filter(|f| before.contains(f));
        let reordered = !kept_before.eq(kept_after);

        ArrayDiff {
            added,
            removed,
            reordered,
            null_changed: self.canonical.is_none() != self.members.is_none(),
        }
    }

    // ── Mutation (store-internal) ─────────────────────────────────────

    pub(crate) fn insert(&mut self, index: usize, fragment: FragmentId) {
        self.members.get_or_insert_with(Vec::new).insert(index, fragment);
    }

    pub(crate) fn remove(&mut self, fragment: FragmentId) -> bool {
        let Some(members) = self.members.as_mut() else {
            return false;
        };
        match members.iter().position(|m| *m == fragment) {
            Some(index) => {
                members.remove(index);
                true
            }
            None => false,
        }
    }

    pub(crate) fn move_member(&mut self, from: usize, to: usize) {
        if let Some(members) = self.members.as_mut() {
            let fragment = members.remove(from);
            members.insert(to, fragment);
        }
    }

    pub(crate) fn replace(&mut self, members: Option<Vec<FragmentId>>) {
        self.members = members;
    }

    /// Replace both the members and the snapshot, as after a push.
    pub(crate) fn reset(&mut self, members: Option<Vec<FragmentId>>) {
        self.canonical = members.clone();
        self.members = members;
        self.in_flight = None;
    }

    pub(crate) fn rollback(&mut self) {
        self.members = self.canonical.clone();
    }

    /// Members captured when the pending save started.
    pub(crate) fn flight_members(&self) -> &[FragmentId] {
        self.in_flight.as_ref().and_then(Option::as_deref).unwrap_or(&[])
    }

    pub(crate) fn begin_flight(&mut self) {
        self.in_flight = Some(self.members.clone());
    }

    /// The save was acknowledged: the in-flight snapshot becomes canonical.
    pub(crate) fn finish_flight(&mut self) {
        if let Some(snapshot) = self.in_flight.take() {
            self.canonical = snapshot;
        }
    }

    pub(crate) fn abort_flight(&mut self) {
        self.in_flight = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordId;

    fn array(members: Option<Vec<u64>>) -> FragmentArray {
        FragmentArray::new(
            EntityRef::Record(RecordId(1)),
            "teams",
            "team",
            members.map(|m| m.into_iter().map(FragmentId).collect()),
        )
    }

    #[test]
    fn fresh_array_has_no_diff() {
        let a = array(Some(vec![1, 2]));
        assert!(!a.membership_changed());
        assert!(a.diff().is_empty());
        assert_eq!(a.len(), 2);
        assert_eq!(a.object_at(1), Some(FragmentId(2)));
        assert_eq!(a.index_of(FragmentId(2)), Some(1));
        assert_eq!(a.index_of(FragmentId(9)), None);
    }

    #[test]
    fn add_then_remove_restores_clean_membership() {
        let mut a = array(Some(vec![1, 2]));
        a.insert(2, FragmentId(3));
        assert!(a.membership_changed());
        assert_eq!(a.diff().added, vec![FragmentId(3)]);
        assert!(a.remove(FragmentId(3)));
        assert!(!a.membership_changed());
    }

    #[test]
    fn reorder_is_detected_without_adds_or_removes() {
        let mut a = array(Some(vec![1, 2, 3]));
        a.move_member(0, 2);
        assert_eq!(a.members(), &[FragmentId(2), FragmentId(3), FragmentId(1)]);
        let diff = a.diff();
        assert!(diff.added.is_empty());
        assert!(diff.removed.is_empty());
        assert!(diff.reordered);
    }

    #[test]
    fn removal_shows_in_diff_and_rollback_restores_order() {
        let mut a = array(Some(vec![1, 2, 3]));
        a.remove(FragmentId(2));
        a.insert(0, FragmentId(4));
        let diff = a.diff();
        assert_eq!(diff.removed, vec![FragmentId(2)]);
        assert_eq!(diff.added, vec![FragmentId(4)]);
        assert!(!diff.reordered);

        a.rollback();
        assert_eq!(a.members(), &[FragmentId(1), FragmentId(2), FragmentId(3)]);
    }

    #[test]
    fn null_and_empty_are_distinct() {
        let mut a = array(None);
        assert!(a.is_null());
        assert_eq!(a.len(), 0);
        a.replace(Some(Vec::new()));
        assert!(!a.is_null());
        assert!(a.membership_changed());
        assert!(a.diff().null_changed);
    }

    #[test]
    fn flight_snapshot_becomes_canonical_on_finish() {
        let mut a = array(Some(vec![1]));
        a.insert(1, FragmentId(2));
        a.begin_flight();
        a.insert(2, FragmentId(3));
        a.finish_flight();
        assert_eq!(a.canonical(), Some(&[FragmentId(1), FragmentId(2)][..]));
        assert_eq!(a.diff().added, vec![FragmentId(3)]);
    }

    #[test]
    fn flight_members_outlive_removal() {
        let mut a = array(Some(vec![1, 2]));
        assert!(a.flight_members().is_empty());
        a.begin_flight();
        a.remove(FragmentId(1));
        assert_eq!(a.members(), &[FragmentId(2)]);
        assert_eq!(a.flight_members(), &[FragmentId(1), FragmentId(2)]);
        a.abort_flight();
        assert!(a.flight_members().is_empty());
    }
}
