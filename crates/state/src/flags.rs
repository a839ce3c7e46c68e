//! Boolean state properties declared per node and inherited down the tree.

/// Per-node overrides. `None` means "inherit from the parent node".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlagOverrides {
    pub is_empty: Option<bool>,
    pub is_loading: Option<bool>,
    pub is_loaded: Option<bool>,
    pub is_dirty: Option<bool>,
    pub is_saving: Option<bool>,
    pub is_deleted: Option<bool>,
    pub is_new: Option<bool>,
    pub is_valid: Option<bool>,
}

/// Fully resolved state properties for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateFlags {
    pub is_empty: bool,
    pub is_loading: bool,
    pub is_loaded: bool,
    pub is_dirty: bool,
    pub is_saving: bool,
    pub is_deleted: bool,
    pub is_new: bool,
    pub is_valid: bool,
}

impl Default for StateFlags {
    fn default() -> Self {
        StateFlags {
            is_empty: false,
            is_loading: false,
            is_loaded: false,
            is_dirty: false,
            is_saving: false,
            is_deleted: false,
            is_new: false,
            is_valid: true,
        }
    }
}

impl StateFlags {
    /// Apply a child's overrides on top of the parent's resolved flags.
    pub(crate) fn inherit(parent: StateFlags, o: &FlagOverrides) -> StateFlags {
        StateFlags {
            is_empty: o.is_empty.unwrap_or(parent.is_empty),
            is_loading: o.is_loading.unwrap_or(parent.is_loading),
            is_loaded: o.is_loaded.unwrap_or(parent.is_loaded),
            is_dirty: o.is_dirty.unwrap_or(parent.is_dirty),
            is_saving: o.is_saving.unwrap_or(parent.is_saving),
            is_deleted: o.is_deleted.unwrap_or(parent.is_deleted),
            is_new: o.is_new.unwrap_or(parent.is_new),
            is_valid: o.is_valid.unwrap_or(parent.is_valid),
        }
    }
}
