/// All errors that can be returned while building or driving a state machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// A node path was declared before its parent, or declared twice.
    #[error("invalid state path '{path}': {message}")]
    InvalidPath { path: String, message: String },

    /// A transition names a target node that was never declared.
    #[error("state '{state}' has a transition on '{event}' to unknown state '{target}'")]
    UnknownTarget {
        state: String,
        event: String,
        target: String,
    },

    /// `transition_to` could not resolve the requested path from the current node.
    #[error("cannot resolve state '{target}' from '{from}'")]
    UnresolvedState { from: String, target: String },

    /// The current node (and every ancestor) rejected the event.
    #[error("attempted to handle event '{event}' while in state '{state}'")]
    UnhandledEvent { state: String, event: String },

    /// An event name did not match any known lifecycle event.
    #[error("unknown event name '{0}'")]
    UnknownEvent(String),
}
