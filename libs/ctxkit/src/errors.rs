//! Error taxonomy shared by every context operation.

use std::fmt;

use thiserror::Error;

use crate::lifecycle::LifecycleState;

/// What kind of thing a failed lookup was searching for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    Component,
    Resource,
    Message,
    Property,
}

impl fmt::Display for LookupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LookupKind::Component => "component",
            LookupKind::Resource => "resource",
            LookupKind::Message => "message",
            LookupKind::Property => "property",
        };
        f.write_str(s)
    }
}

/// Why an operation was refused by the lifecycle gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidStateReason {
    /// The context has not completed `refresh` yet.
    NotRefreshed,
    /// The context has been closed.
    Closed,
    /// `refresh` is one-shot and already ran.
    AlreadyRefreshed,
    /// The context was built without this facility.
    Unsupported,
    /// A weak context handle outlived its context.
    Dropped,
}

impl InvalidStateReason {
    pub(crate) fn for_state(state: LifecycleState) -> Self {
        match state {
            LifecycleState::Unrefreshed => InvalidStateReason::NotRefreshed,
            LifecycleState::Active => InvalidStateReason::AlreadyRefreshed,
            LifecycleState::Closed => InvalidStateReason::Closed,
        }
    }
}

impl fmt::Display for InvalidStateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InvalidStateReason::NotRefreshed => "context has not been refreshed yet",
            InvalidStateReason::Closed => "context has been closed",
            InvalidStateReason::AlreadyRefreshed => "context does not support multiple refresh attempts",
            InvalidStateReason::Unsupported => "context does not expose this facility",
            InvalidStateReason::Dropped => "context no longer exists",
        };
        f.write_str(s)
    }
}

/// Structured errors for context lookups, capability delegation and lifecycle transitions.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("no {kind} found for '{key}'")]
    NotFound { kind: LookupKind, key: String },

    #[error("cannot {operation}: {reason}")]
    InvalidState {
        operation: &'static str,
        reason: InvalidStateReason,
    },

    #[error("expected a single component of type {type_name} but found {}: {}", .candidates.len(), .candidates.join(", "))]
    AmbiguousMatch {
        type_name: &'static str,
        candidates: Vec<String>,
    },

    #[error("component '{name}' does not expose type {expected}")]
    TypeMismatch { name: String, expected: &'static str },

    #[error("component '{0}' is already registered at this level")]
    DuplicateComponent(String),
}

impl ContextError {
    pub fn not_found(kind: LookupKind, key: impl Into<String>) -> Self {
        ContextError::NotFound {
            kind,
            key: key.into(),
        }
    }

    pub fn invalid_state(operation: &'static str, reason: InvalidStateReason) -> Self {
        ContextError::InvalidState { operation, reason }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ContextError::NotFound { .. })
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, ContextError::InvalidState { .. })
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, ContextError::AmbiguousMatch { .. })
    }
}

pub type ContextResult<T> = Result<T, ContextError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_names_the_key() {
        let err = ContextError::not_found(LookupKind::Component, "missing");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "no component found for 'missing'");
    }

    #[test]
    fn ambiguous_lists_candidates() {
        let err = ContextError::AmbiguousMatch {
            type_name: "u32",
            candidates: vec!["a".into(), "b".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("found 2"));
        assert!(msg.contains("a, b"));
    }

    #[test]
    fn invalid_state_reason_follows_state() {
        assert_eq!(
            InvalidStateReason::for_state(LifecycleState::Closed),
            InvalidStateReason::Closed
        );
        let err = ContextError::invalid_state("publish event", InvalidStateReason::Closed);
        assert!(err.is_invalid_state());
        assert_eq!(err.to_string(), "cannot publish event: context has been closed");
    }
}
