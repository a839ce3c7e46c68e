//! Hierarchical state machine engine.
//!
//! Nodes are addressed by dot-separated paths (`root.loaded.saved`). An event
//! that a leaf does not handle is retried against each ancestor up to the
//! root. Hooks are plain function pointers over the entity context `C`, so a
//! built machine holds no entity state and can be shared by every record and
//! fragment in a store.
//!
//! Hook order for a transition `from -> to`:
//! 1. the transition action (if the transition declares one)
//! 2. `exit` on every node from `from` up to, not including, the common ancestor
//! 3. the context's current state is updated to `to`
//! 4. `enter` on every newly entered node, parent to child
//! 5. `setup` on `to`

use std::collections::BTreeMap;
use std::fmt;

use crate::error::StateError;
use crate::event::Event;
use crate::flags::{FlagOverrides, StateFlags};

// ──────────────────────────────────────────────
// Core types
// ──────────────────────────────────────────────

/// Handle to a node in a built [`StateMachine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateId(usize);

/// A hook run against the entity whose state is changing.
pub type Hook<C> = fn(&mut C);

/// Anything that carries a current state driven by a [`StateMachine`].
pub trait Stateful {
    fn current_state(&self) -> StateId;
    fn set_current_state(&mut self, state: StateId);
}

/// What to do with an event that no node on the path to the root handles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnhandledPolicy {
    /// Log at debug level and leave the state unchanged.
    #[default]
    Ignore,
    /// Log at warn level and return [`StateError::UnhandledEvent`].
    Reject,
}

/// Record of a single state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRecord {
    /// `None` for forced transitions made through `transition_to`.
    pub event: Option<Event>,
    pub from: String,
    pub to: String,
}

/// Result of delivering an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Transitioned(TransitionRecord),
    Ignored,
}

impl Dispatch {
    pub fn is_transition(&self) -> bool {
        matches!(self, Dispatch::Transitioned(_))
    }
}

struct Transition<C> {
    target: StateId,
    action: Option<Hook<C>>,
}

struct StateNode<C> {
    path: String,
    parent: Option<StateId>,
    depth: usize,
    transitions: BTreeMap<Event, Transition<C>>,
    enter: Option<Hook<C>>,
    setup: Option<Hook<C>>,
    exit: Option<Hook<C>>,
    unhandled: Option<UnhandledPolicy>,
    flags: StateFlags,
}

/// A built, immutable state graph.
pub struct StateMachine<C> {
    nodes: Vec<StateNode<C>>,
    index: BTreeMap<String, StateId>,
    default_policy: UnhandledPolicy,
}

impl<C> fmt::Debug for StateMachine<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("states", &self.index.keys().collect::<Vec<_>>())
            .field("default_policy", &self.default_policy)
            .finish()
    }
}

// ──────────────────────────────────────────────
// Builder
// ──────────────────────────────────────────────

/// Declaration of one node, consumed by [`StateMachineBuilder::node`].
pub struct NodeDecl<C> {
    path: String,
    flags: FlagOverrides,
    transitions: Vec<(Event, String, Option<Hook<C>>)>,
    enter: Option<Hook<C>>,
    setup: Option<Hook<C>>,
    exit: Option<Hook<C>>,
    unhandled: Option<UnhandledPolicy>,
}

impl<C> NodeDecl<C> {
    fn new(path: &str) -> Self {
        NodeDecl {
            path: path.to_string(),
            flags: FlagOverrides::default(),
            transitions: Vec::new(),
            enter: None,
            setup: None,
            exit: None,
            unhandled: None,
        }
    }

    /// Handle `event` by moving to the node at absolute path `target`.
    pub fn on(mut self, event: Event, target: &str) -> Self {
        self.transitions.push((event, target.to_string(), None));
        self
    }

    /// Like [`NodeDecl::on`], running `action` before any exit hook.
    pub fn on_with(mut self, event: Event, target: &str, action: Hook<C>) -> Self {
        self.transitions
            .push((event, target.to_string(), Some(action)));
        self
    }

    pub fn enter(mut self, hook: Hook<C>) -> Self {
        self.enter = Some(hook);
        self
    }

    pub fn setup(mut self, hook: Hook<C>) -> Self {
        self.setup = Some(hook);
        self
    }

    pub fn exit(mut self, hook: Hook<C>) -> Self {
        self.exit = Some(hook);
        self
    }

    pub fn unhandled(mut self, policy: UnhandledPolicy) -> Self {
        self.unhandled = Some(policy);
        self
    }

    pub fn empty(mut self, value: bool) -> Self {
        self.flags.is_empty = Some(value);
        self
    }

    pub fn loading(mut self, value: bool) -> Self {
        self.flags.is_loading = Some(value);
        self
    }

    pub fn loaded(mut self, value: bool) -> Self {
        self.flags.is_loaded = Some(value);
        self
    }

    pub fn dirty(mut self, value: bool) -> Self {
        self.flags.is_dirty = Some(value);
        self
    }

    pub fn saving(mut self, value: bool) -> Self {
        self.flags.is_saving = Some(value);
        self
    }

    pub fn deleted(mut self, value: bool) -> Self {
        self.flags.is_deleted = Some(value);
        self
    }

    pub fn new_record(mut self, value: bool) -> Self {
        self.flags.is_new = Some(value);
        self
    }

    pub fn valid(mut self, value: bool) -> Self {
        self.flags.is_valid = Some(value);
        self
    }
}

/// Collects node declarations; parents must be declared before children.
pub struct StateMachineBuilder<C> {
    decls: Vec<NodeDecl<C>>,
    default_policy: UnhandledPolicy,
    error: Option<StateError>,
}

impl<C> Default for StateMachineBuilder<C> {
    fn default() -> Self {
        StateMachineBuilder {
            decls: Vec::new(),
            default_policy: UnhandledPolicy::Ignore,
            error: None,
        }
    }
}

impl<C> StateMachineBuilder<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy used when neither the current node nor an ancestor overrides it.
    pub fn default_policy(mut self, policy: UnhandledPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    pub fn node(mut self, path: &str, declare: impl FnOnce(NodeDecl<C>) -> NodeDecl<C>) -> Self {
        if self.error.is_some() {
            return self;
        }
        if let Some(message) = self.check_path(path) {
            self.error = Some(StateError::InvalidPath {
                path: path.to_string(),
                message,
            });
            return self;
        }
        self.decls.push(declare(NodeDecl::new(path)));
        self
    }

    fn check_path(&self, path: &str) -> Option<String> {
        if path.is_empty() || path.split('.').any(|seg| seg.is_empty()) {
            return Some("empty path segment".to_string());
        }
        if self.decls.iter().any(|d| d.path == path) {
            return Some("declared twice".to_string());
        }
        match path.rsplit_once('.') {
            None if !self.decls.is_empty() => Some("only one root node is allowed".to_string()),
            None => None,
            Some((parent, _)) if !self.decls.iter().any(|d| d.path == parent) => {
                Some(format!("parent '{}' is not declared", parent))
            }
            Some(_) => None,
        }
    }

    pub fn build(self) -> Result<StateMachine<C>, StateError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if self.decls.is_empty() {
            return Err(StateError::InvalidPath {
                path: String::new(),
                message: "state machine has no root node".to_string(),
            });
        }

        let index: BTreeMap<String, StateId> = self
            .decls
            .iter()
            .enumerate()
            .map(|(i, d)| (d.path.clone(), StateId(i)))
            .collect();

        let mut nodes: Vec<StateNode<C>> = Vec::with_capacity(self.decls.len());
        for decl in self.decls {
            let parent = decl
                .path
                .rsplit_once('.')
                .and_then(|(p, _)| index.get(p).copied());
            let (depth, parent_flags) = match parent {
                Some(StateId(p)) => (nodes[p].depth + 1, nodes[p].flags),
                None => (0, StateFlags::default()),
            };

            let mut transitions = BTreeMap::new();
            for (event, target, action) in decl.transitions {
                let target_id =
                    index
                        .get(&target)
                        .copied()
                        .ok_or_else(|| StateError::UnknownTarget {
                            state: decl.path.clone(),
                            event: event.to_string(),
                            target: target.clone(),
                        })?;
                transitions.insert(
                    event,
                    Transition {
                        target: target_id,
                        action,
                    },
                );
            }

            nodes.push(StateNode {
                flags: StateFlags::inherit(parent_flags, &decl.flags),
                path: decl.path,
                parent,
                depth,
                transitions,
                enter: decl.enter,
                setup: decl.setup,
                exit: decl.exit,
                unhandled: decl.unhandled,
            });
        }

        Ok(StateMachine {
            nodes,
            index,
            default_policy: self.default_policy,
        })
    }
}

// ──────────────────────────────────────────────
// Queries
// ──────────────────────────────────────────────

impl<C> StateMachine<C> {
    pub fn builder() -> StateMachineBuilder<C> {
        StateMachineBuilder::new()
    }

    pub fn root(&self) -> StateId {
        StateId(0)
    }

    pub fn lookup(&self, path: &str) -> Option<StateId> {
        self.index.get(path).copied()
    }

    pub fn path(&self, state: StateId) -> &str {
        &self.nodes[state.0].path
    }

    pub fn parent(&self, state: StateId) -> Option<StateId> {
        self.nodes[state.0].parent
    }

    pub fn flags(&self, state: StateId) -> StateFlags {
        self.nodes[state.0].flags
    }

    /// True if `state` is the node at `path` or one of its descendants.
    pub fn is_within(&self, state: StateId, path: &str) -> bool {
        let own = self.path(state);
        own == path
            || own
                .strip_prefix(path)
                .is_some_and(|rest| rest.starts_with('.'))
    }

    /// True if `state` or one of its ancestors handles `event`.
    pub fn accepts(&self, state: StateId, event: Event) -> bool {
        self.find_transition(state, event).is_some()
    }

    fn find_transition(&self, state: StateId, event: Event) -> Option<&Transition<C>> {
        let mut cursor = Some(state);
        while let Some(id) = cursor {
            let node = &self.nodes[id.0];
            if let Some(t) = node.transitions.get(&event) {
                return Some(t);
            }
            cursor = node.parent;
        }
        None
    }

    fn policy_for(&self, state: StateId) -> UnhandledPolicy {
        let mut cursor = Some(state);
        while let Some(id) = cursor {
            let node = &self.nodes[id.0];
            if let Some(policy) = node.unhandled {
                return policy;
            }
            cursor = node.parent;
        }
        self.default_policy
    }

    fn common_ancestor(&self, a: StateId, b: StateId) -> StateId {
        let (mut a, mut b) = (a, b);
        while self.nodes[a.0].depth > self.nodes[b.0].depth {
            a = self.nodes[a.0].parent.unwrap_or(a);
        }
        while self.nodes[b.0].depth > self.nodes[a.0].depth {
            b = self.nodes[b.0].parent.unwrap_or(b);
        }
        while a != b {
            match (self.nodes[a.0].parent, self.nodes[b.0].parent) {
                (Some(pa), Some(pb)) => {
                    a = pa;
                    b = pb;
                }
                _ => break,
            }
        }
        a
    }

    /// Resolve `target` absolutely, or relative to the current node and
    /// each of its ancestors (deepest first).
    pub fn resolve(&self, from: StateId, target: &str) -> Option<StateId> {
        if let Some(id) = self.lookup(target) {
            return Some(id);
        }
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            let candidate = format!("{}.{}", self.path(id), target);
            if let Some(found) = self.lookup(&candidate) {
                return Some(found);
            }
            cursor = self.parent(id);
        }
        None
    }
}

// ──────────────────────────────────────────────
// Dispatch
// ──────────────────────────────────────────────

impl<C: Stateful> StateMachine<C> {
    /// Deliver `event` to the context's current state.
    pub fn send(&self, event: Event, ctx: &mut C) -> Result<Dispatch, StateError> {
        let current = ctx.current_state();
        let Some(transition) = self.find_transition(current, event) else {
            return self.unhandled(current, event);
        };
        if let Some(action) = transition.action {
            action(ctx);
        }
        let record = self.run_transition(current, transition.target, Some(event), ctx);
        Ok(Dispatch::Transitioned(record))
    }

    /// Force a move to `target` without requiring an event on the current node.
    pub fn transition_to(&self, target: &str, ctx: &mut C) -> Result<TransitionRecord, StateError> {
        let current = ctx.current_state();
        let to = self
            .resolve(current, target)
            .ok_or_else(|| StateError::UnresolvedState {
                from: self.path(current).to_string(),
                target: target.to_string(),
            })?;
        Ok(self.run_transition(current, to, None, ctx))
    }

    fn unhandled(&self, current: StateId, event: Event) -> Result<Dispatch, StateError> {
        let state = self.path(current);
        match self.policy_for(current) {
            UnhandledPolicy::Ignore => {
                tracing::debug!(state, event = event.as_str(), "ignored unhandled event");
                Ok(Dispatch::Ignored)
            }
            UnhandledPolicy::Reject => {
                tracing::warn!(state, event = event.as_str(), "rejected unhandled event");
                Err(StateError::UnhandledEvent {
                    state: state.to_string(),
                    event: event.to_string(),
                })
            }
        }
    }

    fn run_transition(
        &self,
        from: StateId,
        to: StateId,
        event: Option<Event>,
        ctx: &mut C,
    ) -> TransitionRecord {
        let pivot = self.common_ancestor(from, to);

        let mut cursor = from;
        while cursor != pivot {
            let node = &self.nodes[cursor.0];
            if let Some(exit) = node.exit {
                exit(ctx);
            }
            match node.parent {
                Some(parent) => cursor = parent,
                None => break,
            }
        }

        ctx.set_current_state(to);

        let mut entering = Vec::new();
        let mut cursor = to;
        while cursor != pivot {
            entering.push(cursor);
            match self.nodes[cursor.0].parent {
                Some(parent) => cursor = parent,
                None => break,
            }
        }
        for id in entering.into_iter().rev() {
            if let Some(enter) = self.nodes[id.0].enter {
                enter(ctx);
            }
        }
        if let Some(setup) = self.nodes[to.0].setup {
            setup(ctx);
        }

        let record = TransitionRecord {
            event,
            from: self.path(from).to_string(),
            to: self.path(to).to_string(),
        };
        tracing::trace!(
            from = %record.from,
            to = %record.to,
            event = event.map(|e| e.as_str()).unwrap_or("transitionTo"),
            "state transition"
        );
        record
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
