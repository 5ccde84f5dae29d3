//! Graceful shutdown signal handling.
//!
//! [`ShutdownSignal`] is a latched, cloneable notification: once triggered
//! it stays triggered, and waiters that subscribe late still observe it.
//! OS termination signals (SIGINT, SIGTERM) are wired into it through a
//! revocable [`SignalRegistration`].
//!
//! [`ConnectionTracker`] counts live connections so a drain can wait for
//! the count to reach zero.
//!
//! # Example
//!
//! ```rust,ignore
//! use todos_server::ShutdownSignal;
//!
//! let shutdown = ShutdownSignal::new();
//! let registration = shutdown.register_os_signals()?;
//!
//! shutdown.recv().await;
//! registration.deregister();
//! ```

use std::fmt;
use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;

/// A signal that can be used to trigger and await shutdown.
///
/// All clones share state; triggering any clone notifies every waiter.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    /// Whether shutdown has been triggered
    triggered: Arc<AtomicBool>,

    /// Broadcast sender for notifying waiters
    sender: broadcast::Sender<()>,
}

impl ShutdownSignal {
    /// Creates a new, untriggered shutdown signal.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            triggered: Arc::new(AtomicBool::new(false)),
            sender,
        }
    }

    /// Triggers the signal. Idempotent.
    pub fn trigger(&self) {
        if self
            .triggered
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            // No receivers is fine: the flag is latched.
            let _ = self.sender.send(());
        }
    }

    /// Returns `true` if the signal has been triggered.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Returns a future that completes once the signal is triggered.
    ///
    /// The subscription is taken when this method is called, not when the
    /// future is first polled, so a trigger between the two is not lost.
    /// Completes immediately if the signal already fired.
    pub fn recv(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut receiver = self.sender.subscribe();
        let triggered = Arc::clone(&self.triggered);
        async move {
            if triggered.load(Ordering::SeqCst) {
                return;
            }
            // Lagged or closed both mean the signal fired or can never fire
            // again through this sender; either way stop waiting.
            let _ = receiver.recv().await;
        }
    }

    /// Registers interest in SIGINT and SIGTERM (Ctrl+C off Unix) and
    /// triggers this signal when one arrives.
    ///
    /// Registration happens before this returns, so a signal delivered
    /// afterwards is never lost. Dropping or
    /// [deregistering](SignalRegistration::deregister) the returned handle
    /// stops observing OS signals.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn register_os_signals(&self) -> io::Result<SignalRegistration> {
        let mut signals = OsSignals::register()?;
        let shutdown = self.clone();

        let task = tokio::spawn(async move {
            let received = signals.recv().await;
            tracing::info!(signal = %received, "Received termination signal, initiating graceful shutdown");
            shutdown.trigger();
        });

        Ok(SignalRegistration { task })
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// The OS signal that requested termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    /// SIGINT / Ctrl+C.
    Interrupt,
    /// SIGTERM.
    Terminate,
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupt => f.write_str("SIGINT"),
            Self::Terminate => f.write_str("SIGTERM"),
        }
    }
}

/// Handle to an active OS signal registration.
///
/// Dropping it stops observing OS signals.
#[derive(Debug)]
pub struct SignalRegistration {
    task: JoinHandle<()>,
}

impl SignalRegistration {
    /// Stops observing OS signals.
    pub fn deregister(self) {
        tracing::debug!("Deregistering termination signal handlers");
        drop(self);
    }

    /// Returns `true` while signals are still being observed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for SignalRegistration {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(unix)]
struct OsSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl OsSignals {
    fn register() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    async fn recv(&mut self) -> TerminationSignal {
        tokio::select! {
            Some(()) = self.interrupt.recv() => TerminationSignal::Interrupt,
            Some(()) = self.terminate.recv() => TerminationSignal::Terminate,
            else => std::future::pending().await,
        }
    }
}

#[cfg(windows)]
struct OsSignals {
    ctrl_c: tokio::signal::windows::CtrlC,
}

#[cfg(windows)]
impl OsSignals {
    fn register() -> io::Result<Self> {
        Ok(Self {
            ctrl_c: tokio::signal::windows::ctrl_c()?,
        })
    }

    async fn recv(&mut self) -> TerminationSignal {
        match self.ctrl_c.recv().await {
            Some(()) => TerminationSignal::Interrupt,
            None => std::future::pending().await,
        }
    }
}

/// Tracks active connections during shutdown.
///
/// Each connection holds a [`ConnectionToken`]; when the last token is
/// dropped, [`wait_for_shutdown`](Self::wait_for_shutdown) completes.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    active: Arc<AtomicUsize>,
    notify: Arc<Notify>,
}

impl ConnectionTracker {
    /// Creates a new connection tracker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicUsize::new(0)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Acquires a connection token, held for the life of the connection.
    #[must_use]
    pub fn acquire(&self) -> ConnectionToken {
        self.active.fetch_add(1, Ordering::SeqCst);
        ConnectionToken {
            active: Arc::clone(&self.active),
            notify: Arc::clone(&self.notify),
        }
    }

    /// Returns the number of active connections.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Waits until all connections are closed.
    ///
    /// Completes immediately if there are no active connections.
    pub async fn wait_for_shutdown(&self) {
        loop {
            // Create the waiter before checking the count: notify_waiters
            // only wakes futures that already exist.
            let notified = self.notify.notified();
            if self.active.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// A token representing an active connection.
#[derive(Debug)]
pub struct ConnectionToken {
    active: Arc<AtomicUsize>,
    notify: Arc<Notify>,
}

impl Drop for ConnectionToken {
    fn drop(&mut self) {
        if self.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.notify.notify_waiters();
        }
    }
}
