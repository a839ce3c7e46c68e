//! tessera-state: hierarchical lifecycle state machine.
//!
//! Provides a generic dot-path state graph ([`StateMachine`]) with
//! parent-fallback event lookup and enter/setup/exit hooks, and the
//! concrete record/fragment lifecycle built on it ([`lifecycle`]).
//! Records and fragments share one built machine; each entity only
//! carries its current [`StateId`].

mod error;
mod event;
mod flags;
pub mod lifecycle;
mod machine;

pub use error::StateError;
pub use event::Event;
pub use flags::{FlagOverrides, StateFlags};
pub use lifecycle::{build_lifecycle, LifecycleContext};
pub use machine::{
    Dispatch, Hook, NodeDecl, StateId, StateMachine, StateMachineBuilder, Stateful,
    TransitionRecord, UnhandledPolicy,
};
