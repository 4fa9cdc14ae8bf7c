//! Lifecycle gate - the Unrefreshed → Active → Closed state machine.
//!
//! Readers check the state with an acquire load and never block. Transitions
//! are serialized through a single mutex and published with a release store,
//! so a reader that observes `Active` also observes everything written before
//! the transition committed.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::{Mutex, MutexGuard};

use crate::errors::{ContextError, InvalidStateReason};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LifecycleState {
    Unrefreshed = 0,
    Active = 1,
    Closed = 2,
}

impl LifecycleState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => LifecycleState::Unrefreshed,
            1 => LifecycleState::Active,
            _ => LifecycleState::Closed,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Unrefreshed => "unrefreshed",
            LifecycleState::Active => "active",
            LifecycleState::Closed => "closed",
        };
        f.write_str(s)
    }
}

pub struct LifecycleGate {
    state: AtomicU8,
    transition: Mutex<()>,
}

impl Default for LifecycleGate {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LifecycleGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleGate")
            .field("state", &self.state())
            .finish()
    }
}

impl LifecycleGate {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(LifecycleState::Unrefreshed as u8),
            transition: Mutex::new(()),
        }
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Fails with `InvalidState` unless the gate is `Active`.
    pub fn ensure_active(&self, operation: &'static str) -> Result<(), ContextError> {
        match self.state() {
            LifecycleState::Active => Ok(()),
            other => Err(ContextError::invalid_state(
                operation,
                InvalidStateReason::for_state(other),
            )),
        }
    }

    /// Enter the exclusive transition section.
    pub fn transition(&self) -> Transition<'_> {
        Transition {
            gate: self,
            _guard: self.transition.lock(),
        }
    }
}

/// Exclusive access to the gate for the duration of one transition.
pub struct Transition<'a> {
    gate: &'a LifecycleGate,
    _guard: MutexGuard<'a, ()>,
}

impl Transition<'_> {
    pub fn state(&self) -> LifecycleState {
        self.gate.state()
    }

    /// Move forward to `to`. Going backwards, or staying put, is refused.
    pub fn advance(&mut self, operation: &'static str, to: LifecycleState) -> Result<(), ContextError> {
        let current = self.state();
        if to <= current {
            return Err(ContextError::invalid_state(
                operation,
                InvalidStateReason::for_state(current),
            ));
        }
        self.gate.state.store(to as u8, Ordering::Release);
        tracing::trace!(from = %current, to = %to, "lifecycle transition");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unrefreshed_and_refuses_reads() {
        let gate = LifecycleGate::new();
        assert_eq!(gate.state(), LifecycleState::Unrefreshed);
        let err = gate.ensure_active("lookup").unwrap_err();
        assert!(matches!(
            err,
            ContextError::InvalidState {
                reason: InvalidStateReason::NotRefreshed,
                ..
            }
        ));
    }

    #[test]
    fn linear_transitions() {
        let gate = LifecycleGate::new();
        gate.transition()
            .advance("refresh", LifecycleState::Active)
            .unwrap();
        assert!(gate.ensure_active("lookup").is_ok());

        gate.transition()
            .advance("close", LifecycleState::Closed)
            .unwrap();
        assert_eq!(gate.state(), LifecycleState::Closed);

        // No way back.
        let err = gate
            .transition()
            .advance("refresh", LifecycleState::Active)
            .unwrap_err();
        assert!(matches!(
            err,
            ContextError::InvalidState {
                reason: InvalidStateReason::Closed,
                ..
            }
        ));
    }

    #[test]
    fn unrefreshed_may_close_directly() {
        let gate = LifecycleGate::new();
        gate.transition()
            .advance("close", LifecycleState::Closed)
            .unwrap();
        assert_eq!(gate.state(), LifecycleState::Closed);
    }

    #[test]
    fn refresh_twice_is_refused() {
        let gate = LifecycleGate::new();
        let mut tx = gate.transition();
        tx.advance("refresh", LifecycleState::Active).unwrap();
        let err = tx.advance("refresh", LifecycleState::Active).unwrap_err();
        assert!(matches!(
            err,
            ContextError::InvalidState {
                reason: InvalidStateReason::AlreadyRefreshed,
                ..
            }
        ));
    }
}
