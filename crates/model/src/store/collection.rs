//! Fragment slots: has-one `fragment` attributes and ordered
//! `fragmentArray` collections, plus owner binding.

use std::collections::BTreeSet;

use super::Store;
use crate::entity::FragmentSlot;
use crate::error::ModelError;
use crate::fragment_array::FragmentArray;
use crate::record::{EntityRef, FragmentId};

impl Store {
    // ──────────────────────────────────────────────
    // Slot access
    // ──────────────────────────────────────────────

    pub(crate) fn slot(&self, owner: EntityRef, name: &str) -> Result<&FragmentSlot, ModelError> {
        let decl = self.decl(owner, name)?;
        self.entity(owner)?
            .slots
            .get(name)
            .ok_or_else(|| self.kind_error(owner, decl, "fragment or fragmentArray"))
    }

    pub(crate) fn slot_mut(&mut self, owner: EntityRef, name: &str) -> Result<&mut FragmentSlot, ModelError> {
        self.slot(owner, name)?;
        let model = self.model_name(owner)?.to_string();
        self.entity_mut(owner)?
            .slots
            .get_mut(name)
            .ok_or(ModelError::UnknownAttribute {
                model,
                attribute: name.to_string(),
            })
    }

    pub(crate) fn slot_names(&self, owner: EntityRef) -> Result<Vec<String>, ModelError> {
        Ok(self.entity(owner)?.slots.keys().cloned().collect())
    }

    /// Declared fragment model of `name`, which must be of kind `expected`.
    fn slot_model(&self, owner: EntityRef, name: &str, expected: &'static str) -> Result<String, ModelError> {
        let decl = self.decl(owner, name)?;
        if decl.kind.as_str() != expected {
            return Err(self.kind_error(owner, decl, expected));
        }
        Ok(decl.kind.target_model().unwrap_or_default().to_string())
    }

    pub(crate) fn array_mut(&mut self, owner: EntityRef, name: &str) -> Result<&mut FragmentArray, ModelError> {
        self.slot_model(owner, name, "fragmentArray")?;
        let mismatch = self.storage_mismatch(owner, name, "fragmentArray", "fragment");
        match self.slot_mut(owner, name)? {
            FragmentSlot::Many(array) => Ok(array),
            FragmentSlot::One(_) => Err(mismatch),
        }
    }

    /// The slot's storage disagrees with its declared kind.
    fn storage_mismatch(
        &self,
        owner: EntityRef,
        name: &str,
        expected: &'static str,
        actual: &'static str,
    ) -> ModelError {
        ModelError::AttributeKind {
            model: self.model_name(owner).unwrap_or_default().to_string(),
            attribute: name.to_string(),
            expected,
            actual,
        }
    }

    fn check_model(&self, fragment: FragmentId, name: &str, expected: &str) -> Result<(), ModelError> {
        let actual = self.fragment(fragment)?.model();
        if actual != expected {
            return Err(ModelError::WrongModel {
                attribute: name.to_string(),
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }

    // ──────────────────────────────────────────────
    // Ownership
    // ──────────────────────────────────────────────

    /// Fail unless `fragment` may be bound to `owner`'s attribute `name`.
    ///
    /// A fragment keeps the first owner and attribute it is attached to,
    /// even after removal, and may never end up beneath itself.
    pub(crate) fn check_claim(&self, fragment: FragmentId, owner: EntityRef, name: &str) -> Result<(), ModelError> {
        let mut cursor = Some(owner);
        while let Some(current) = cursor {
            if current == EntityRef::Fragment(fragment) {
                return Err(ModelError::OwnershipCycle { fragment, owner });
            }
            cursor = match current {
                EntityRef::Fragment(id) => self.fragment(id)?.owner,
                EntityRef::Record(_) => None,
            };
        }

        let f = self.fragment(fragment)?;
        match (f.owner, f.name.as_deref()) {
            (Some(current), Some(current_name)) if current != owner || current_name != name => {
                Err(ModelError::OwnershipViolation {
                    fragment,
                    owner: current,
                    name: current_name.to_string(),
                    attempted: owner,
                    attempted_name: name.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    pub(crate) fn claim(&mut self, fragment: FragmentId, owner: EntityRef, name: &str) -> Result<(), ModelError> {
        self.check_claim(fragment, owner, name)?;
        let f = self.fragment_mut(fragment)?;
        if f.owner.is_none() {
            tracing::trace!(%fragment, %owner, attribute = name, "fragment bound to owner");
            f.owner = Some(owner);
            f.name = Some(name.to_string());
        }
        Ok(())
    }

    /// Recompute the owner's state after a slot's contents changed.
    fn slot_changed(&mut self, owner: EntityRef, name: &str, fragment: Option<FragmentId>) -> Result<(), ModelError> {
        let dirty = self.slot_is_dirty(self.slot(owner, name)?)?;
        if dirty {
            self.fragment_did_dirty(owner, name, fragment)
        } else {
            self.fragment_did_reset(owner, name, fragment)
        }
    }

    // ──────────────────────────────────────────────
    // Has-one fragments
    // ──────────────────────────────────────────────

    /// The fragment currently held by a `fragment` attribute.
    pub fn get_fragment(&self, owner: impl Into<EntityRef>, name: &str) -> Result<Option<FragmentId>, ModelError> {
        let owner = owner.into();
        self.slot_model(owner, name, "fragment")?;
        match self.slot(owner, name)? {
            FragmentSlot::One(r) => Ok(r.current()),
            FragmentSlot::Many(_) => Err(self.storage_mismatch(owner, name, "fragment", "fragmentArray")),
        }
    }

    /// Replace the fragment held by a `fragment` attribute. `None` clears it.
    pub fn set_fragment(
        &mut self,
        owner: impl Into<EntityRef>,
        name: &str,
        fragment: Option<FragmentId>,
    ) -> Result<(), ModelError> {
        let owner = owner.into();
        let model = self.slot_model(owner, name, "fragment")?;
        self.ensure_writable(owner)?;
        if let Some(fragment) = fragment {
            self.check_model(fragment, name, &model)?;
            self.claim(fragment, owner, name)?;
        }
        if let FragmentSlot::One(r) = self.slot_mut(owner, name)? {
            r.current = fragment;
        }
        self.slot_changed(owner, name, fragment)
    }

    // ──────────────────────────────────────────────
    // Fragment arrays
    // ──────────────────────────────────────────────

    pub fn fragment_array(&self, owner: impl Into<EntityRef>, name: &str) -> Result<&FragmentArray, ModelError> {
        let owner = owner.into();
        self.slot_model(owner, name, "fragmentArray")?;
        match self.slot(owner, name)? {
            FragmentSlot::Many(array) => Ok(array),
            FragmentSlot::One(_) => Err(self.storage_mismatch(owner, name, "fragmentArray", "fragment")),
        }
    }

    /// Append `fragment` to the end of a collection.
    pub fn add_fragment(
        &mut self,
        owner: impl Into<EntityRef>,
        name: &str,
        fragment: FragmentId,
    ) -> Result<(), ModelError> {
        let owner = owner.into();
        let index = self.fragment_array(owner, name)?.len();
        self.insert_fragment(owner, name, index, fragment)
    }

    /// Insert `fragment` at `index`, binding it to the owner on first
    /// attachment. A `null` collection becomes a one-element sequence.
    pub fn insert_fragment(
        &mut self,
        owner: impl Into<EntityRef>,
        name: &str,
        index: usize,
        fragment: FragmentId,
    ) -> Result<(), ModelError> {
        let owner = owner.into();
        let model = self.slot_model(owner, name, "fragmentArray")?;
        self.ensure_writable(owner)?;
        self.check_model(fragment, name, &model)?;

        let array = self.fragment_array(owner, name)?;
        if array.contains(fragment) {
            return Err(ModelError::DuplicateMember {
                fragment,
                attribute: name.to_string(),
            });
        }
        if index > array.len() {
            return Err(ModelError::IndexOutOfBounds {
                attribute: name.to_string(),
                index,
                len: array.len(),
            });
        }

        self.claim(fragment, owner, name)?;
        self.array_mut(owner, name)?.insert(index, fragment);
        tracing::debug!(%owner, attribute = name, %fragment, index, "fragment added");
        self.slot_changed(owner, name, Some(fragment))
    }

    /// Remove `fragment` from a collection. Returns `false` if it was not a
    /// member. The fragment stays bound to this owner.
    pub fn remove_fragment(
        &mut self,
        owner: impl Into<EntityRef>,
        name: &str,
        fragment: FragmentId,
    ) -> Result<bool, ModelError> {
        let owner = owner.into();
        self.slot_model(owner, name, "fragmentArray")?;
        self.ensure_writable(owner)?;
        if !self.array_mut(owner, name)?.remove(fragment) {
            return Ok(false);
        }
        tracing::debug!(%owner, attribute = name, %fragment, "fragment removed");
        self.slot_changed(owner, name, Some(fragment))?;
        Ok(true)
    }

    /// Move the member at `from` so it ends up at `to`.
    pub fn move_fragment(
        &mut self,
        owner: impl Into<EntityRef>,
        name: &str,
        from: usize,
        to: usize,
    ) -> Result<(), ModelError> {
        let owner = owner.into();
        self.slot_model(owner, name, "fragmentArray")?;
        self.ensure_writable(owner)?;
        let len = self.fragment_array(owner, name)?.len();
        for index in [from, to] {
            if index >= len {
                return Err(ModelError::IndexOutOfBounds {
                    attribute: name.to_string(),
                    index,
                    len,
                });
            }
        }
        let array = self.array_mut(owner, name)?;
        array.move_member(from, to);
        let moved = array.object_at(to);
        self.slot_changed(owner, name, moved)
    }

    /// Replace a collection's whole membership. `None` sets it to `null`.
    ///
    /// Every fragment is validated before any is bound, so a rejected
    /// assignment leaves the collection and all fragments untouched.
    pub fn set_fragments(
        &mut self,
        owner: impl Into<EntityRef>,
        name: &str,
        members: Option<Vec<FragmentId>>,
    ) -> Result<(), ModelError> {
        let owner = owner.into();
        let model = self.slot_model(owner, name, "fragmentArray")?;
        self.ensure_writable(owner)?;

        if let Some(members) = &members {
            let mut seen = BTreeSet::new();
            for fragment in members {
                if !seen.insert(*fragment) {
                    return Err(ModelError::DuplicateMember {
                        fragment: *fragment,
                        attribute: name.to_string(),
                    });
                }
                self.check_model(*fragment, name, &model)?;
                self.check_claim(*fragment, owner, name)?;
            }
            for fragment in members {
                self.claim(*fragment, owner, name)?;
            }
        }

        self.array_mut(owner, name)?.replace(members);
        tracing::debug!(%owner, attribute = name, "fragment array replaced");
        self.slot_changed(owner, name, None)
    }
}
