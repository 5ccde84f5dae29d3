//! Server lifecycle state.
//!
//! A process moves through [`LifecycleState`] strictly forward:
//!
//! ```text
//! Initializing -> Serving -> Draining -> Terminated
//! ```
//!
//! Steps may be skipped (a startup failure goes straight to `Terminated`)
//! but never repeated or reversed. The owner drives a [`Lifecycle`];
//! anyone else observes it through a cloneable [`LifecycleMonitor`].
//!
//! # Example
//!
//! ```rust
//! use todos_server::{Lifecycle, LifecycleState};
//!
//! let lifecycle = Lifecycle::new();
//! let monitor = lifecycle.monitor();
//!
//! lifecycle.transition(LifecycleState::Serving).unwrap();
//! assert_eq!(monitor.state(), LifecycleState::Serving);
//! assert!(lifecycle.transition(LifecycleState::Initializing).is_err());
//! ```

use std::fmt;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::sync::watch;

/// Phase of the server process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleState {
    /// Registering signals, opening the store, binding.
    Initializing,
    /// Accepting and serving requests.
    Serving,
    /// No longer accepting; waiting for in-flight requests.
    Draining,
    /// All resources released.
    Terminated,
}

impl LifecycleState {
    /// Returns the lowercase state name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Serving => "serving",
            Self::Draining => "draining",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transition that would move the lifecycle backwards or in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid lifecycle transition from {from} to {to}")]
pub struct InvalidTransition {
    /// State at the time of the attempt
    pub from: LifecycleState,
    /// Requested state
    pub to: LifecycleState,
}

#[derive(Debug, Clone, Copy)]
struct Snapshot {
    state: LifecycleState,
    local_addr: Option<SocketAddr>,
}

/// Owner side of the lifecycle state machine.
#[derive(Debug)]
pub struct Lifecycle {
    tx: watch::Sender<Snapshot>,
}

impl Lifecycle {
    /// Creates a lifecycle in [`LifecycleState::Initializing`].
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Snapshot {
            state: LifecycleState::Initializing,
            local_addr: None,
        });
        Self { tx }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.tx.borrow().state
    }

    /// Returns a read-only view that can outlive this handle.
    #[must_use]
    pub fn monitor(&self) -> LifecycleMonitor {
        LifecycleMonitor {
            rx: self.tx.subscribe(),
        }
    }

    /// Moves to `to`, which must come strictly after the current state.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] and leaves the state unchanged if `to`
    /// is not ahead of the current state.
    pub fn transition(&self, to: LifecycleState) -> Result<(), InvalidTransition> {
        let mut result = Ok(());
        self.tx.send_if_modified(|snapshot| {
            if to <= snapshot.state {
                result = Err(InvalidTransition {
                    from: snapshot.state,
                    to,
                });
                return false;
            }
            tracing::info!(from = %snapshot.state, to = %to, "Lifecycle transition");
            snapshot.state = to;
            true
        });
        result
    }

    /// Publishes the address the listener is bound to.
    pub fn set_local_addr(&self, addr: SocketAddr) {
        self.tx.send_modify(|snapshot| snapshot.local_addr = Some(addr));
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only, cloneable view of a [`Lifecycle`].
#[derive(Debug, Clone)]
pub struct LifecycleMonitor {
    rx: watch::Receiver<Snapshot>,
}

impl LifecycleMonitor {
    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.rx.borrow().state
    }

    /// Returns the bound listen address, once known.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.rx.borrow().local_addr
    }

    /// Waits until the lifecycle reaches `state` or any later state.
    ///
    /// Returns the state observed. If the owning [`Lifecycle`] is dropped
    /// first, returns the last published state.
    pub async fn wait_for(&mut self, state: LifecycleState) -> LifecycleState {
        if let Ok(snapshot) = self.rx.wait_for(|snapshot| snapshot.state >= state).await {
            return snapshot.state;
        }
        self.rx.borrow().state
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_states_are_ordered() {
        assert!(LifecycleState::Initializing < LifecycleState::Serving);
        assert!(LifecycleState::Serving < LifecycleState::Draining);
        assert!(LifecycleState::Draining < LifecycleState::Terminated);
        assert_eq!(LifecycleState::Draining.to_string(), "draining");
    }

    #[test]
    fn test_forward_transitions() {
        let lifecycle = Lifecycle::default();
        assert_eq!(lifecycle.state(), LifecycleState::Initializing);

        for next in [
            LifecycleState::Serving,
            LifecycleState::Draining,
            LifecycleState::Terminated,
        ] {
            lifecycle.transition(next).unwrap();
            assert_eq!(lifecycle.state(), next);
        }
    }

    #[test]
    fn test_skip_to_terminated() {
        let lifecycle = Lifecycle::new();
        lifecycle.transition(LifecycleState::Terminated).unwrap();
        assert_eq!(lifecycle.state(), LifecycleState::Terminated);
    }

    #[test]
    fn test_backward_and_repeated_transitions_rejected() {
        let lifecycle = Lifecycle::new();
        lifecycle.transition(LifecycleState::Draining).unwrap();

        let err = lifecycle.transition(LifecycleState::Serving).unwrap_err();
        assert_eq!(
            err,
            InvalidTransition {
                from: LifecycleState::Draining,
                to: LifecycleState::Serving,
            }
        );
        assert!(lifecycle.transition(LifecycleState::Draining).is_err());
        assert_eq!(lifecycle.state(), LifecycleState::Draining);
    }

    #[test]
    fn test_monitor_sees_local_addr() {
        let lifecycle = Lifecycle::new();
        let monitor = lifecycle.monitor();
        assert!(monitor.local_addr().is_none());

        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        lifecycle.set_local_addr(addr);
        assert_eq!(monitor.local_addr(), Some(addr));
    }

    #[tokio::test]
    async fn test_wait_for_later_state() {
        let lifecycle = Lifecycle::new();
        let mut monitor = lifecycle.monitor();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            lifecycle.transition(LifecycleState::Serving).unwrap();
            lifecycle.transition(LifecycleState::Terminated).unwrap();
        });

        let seen = tokio::time::timeout(
            Duration::from_secs(1),
            monitor.wait_for(LifecycleState::Draining),
        )
        .await
        .unwrap();
        assert_eq!(seen, LifecycleState::Terminated);
    }

    #[tokio::test]
    async fn test_wait_for_after_owner_dropped() {
        let lifecycle = Lifecycle::new();
        let mut monitor = lifecycle.monitor();
        drop(lifecycle);

        let seen = monitor.wait_for(LifecycleState::Terminated).await;
        assert_eq!(seen, LifecycleState::Initializing);
    }
}
