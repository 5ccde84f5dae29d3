//! Process lifecycle: startup, serving, bounded drain and ordered teardown.
//!
//! [`Orchestrator::run`] performs, in order:
//!
//! 1. register SIGINT/SIGTERM (before anything can fail slowly)
//! 2. open the store
//! 3. bind the listener and start accepting on a background task
//! 4. wait for whichever comes first: the listener stopping on its own
//!    (fatal) or a termination signal
//! 5. deregister signals, drain with the configured ceiling
//! 6. force-close leftovers, join the listener task, close the store
//!
//! Every exit path ends in [`LifecycleState::Terminated`].

use std::future::Future;

use todos_config::TodosConfig;
use todos_server::{
    Lifecycle, LifecycleMonitor, LifecycleState, ServerConfig, ServerError, ShutdownSignal,
};
use todos_store::TodoStore;

use crate::app;
use crate::error::{LifecycleError, LifecycleResult};

/// Drives one run of the service from startup to exit.
#[derive(Debug)]
pub struct Orchestrator {
    config: TodosConfig,
    shutdown: ShutdownSignal,
    lifecycle: Lifecycle,
    os_signals: bool,
}

impl Orchestrator {
    /// Creates an orchestrator that listens for OS termination signals.
    #[must_use]
    pub fn new(config: TodosConfig) -> Self {
        Self {
            config,
            shutdown: ShutdownSignal::new(),
            lifecycle: Lifecycle::new(),
            os_signals: true,
        }
    }

    /// Does not register OS signal handlers; shutdown then only happens
    /// through [`shutdown_signal`](Self::shutdown_signal).
    #[must_use]
    pub fn without_os_signals(mut self) -> Self {
        self.os_signals = false;
        self
    }

    /// Returns a handle that requests shutdown when triggered.
    #[must_use]
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Returns a read-only view of the lifecycle state.
    #[must_use]
    pub fn monitor(&self) -> LifecycleMonitor {
        self.lifecycle.monitor()
    }

    /// Runs the service until shutdown completes.
    ///
    /// # Errors
    ///
    /// Returns a [`LifecycleError`] for every fatal condition: signal
    /// registration, store acquisition, binding, the listener stopping on
    /// its own, a drain that hit its ceiling, or a failed teardown step.
    /// Resources acquired before the failure are released first.
    pub async fn run(self) -> LifecycleResult<()> {
        let result = self.run_phases().await;

        if let Err(e) = &result {
            tracing::error!(error = %e, "Service terminated with error");
        }
        if self.lifecycle.state() != LifecycleState::Terminated {
            self.lifecycle.transition(LifecycleState::Terminated)?;
        }
        result
    }

    async fn run_phases(&self) -> LifecycleResult<()> {
        tracing::info!(version = crate::VERSION, "Starting todos service");

        let registration = if self.os_signals {
            Some(
                self.shutdown
                    .register_os_signals()
                    .map_err(LifecycleError::Signals)?,
            )
        } else {
            None
        };

        let store = open_store(&self.config.store.path).await?;

        let server_config = server_config(&self.config.server);
        let bound = match app::build_server(&server_config, store.clone()).bind().await {
            Ok(bound) => bound,
            Err(e) => {
                close_store(&store).await;
                return Err(LifecycleError::Listener(e));
            }
        };

        self.lifecycle.set_local_addr(bound.local_addr());
        let mut handle = bound.spawn();
        self.lifecycle.transition(LifecycleState::Serving)?;

        if let Err(e) = until_shutdown_requested(handle.finished(), self.shutdown.recv()).await {
            handle.close();
            close_store(&store).await;
            return Err(e);
        }

        if let Some(registration) = registration {
            registration.deregister();
        }
        self.lifecycle.transition(LifecycleState::Draining)?;

        let ceiling = server_config.shutdown_timeout();
        tracing::info!(
            ceiling_secs = ceiling.as_secs(),
            "Shutdown requested, draining in-flight requests"
        );
        let drained = handle.shutdown(ceiling).await;
        if let Err(e) = &drained {
            tracing::error!(error = %e, "Graceful drain did not complete");
        }

        handle.close();
        let joined = handle.wait().await;
        tracing::info!("Listener closed");

        let store_closed = store.close().await;

        drained.map_err(LifecycleError::Drain)?;
        joined.map_err(|e| LifecycleError::teardown(e.to_string()))?;
        store_closed.map_err(|e| LifecycleError::teardown(format!("closing store: {e}")))?;

        tracing::info!("Shutdown complete");
        Ok(())
    }
}

/// Waits for a shutdown request.
///
/// The listener finishing first is fatal whatever it reports. Both futures
/// exist before the wait starts, so neither wake-up can be missed.
async fn until_shutdown_requested<L, S>(
    listener_finished: L,
    shutdown_requested: S,
) -> LifecycleResult<()>
where
    L: Future<Output = Result<(), ServerError>>,
    S: Future<Output = ()>,
{
    tokio::select! {
        result = listener_finished => Err(match result {
            Ok(()) => LifecycleError::ListenerStopped,
            Err(e) => LifecycleError::Listener(e),
        }),
        () = shutdown_requested => Ok(()),
    }
}

/// Maps the configuration section onto the server's own settings.
#[must_use]
pub fn server_config(config: &todos_config::ServerConfig) -> ServerConfig {
    ServerConfig::builder()
        .http_addr(config.http_addr.as_str())
        .shutdown_timeout(config.shutdown_timeout())
        .keep_alive(config.keep_alive)
        .build()
}

async fn open_store(path: &str) -> LifecycleResult<TodoStore> {
    let path = path.to_string();
    tokio::task::spawn_blocking(move || TodoStore::open(path))
        .await
        .map_err(|e| LifecycleError::Store(todos_store::StoreError::Task(e.to_string())))?
        .map_err(LifecycleError::Store)
}

/// Best-effort close on an error path; the original error wins.
async fn close_store(store: &TodoStore) {
    if let Err(e) = store.close().await {
        tracing::warn!(error = %e, "Failed to close store after startup failure");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_server_config_mapping() {
        let section = todos_config::ServerConfig {
            http_addr: "127.0.0.1:9999".to_string(),
            shutdown_timeout_secs: 7,
            keep_alive: false,
        };
        let config = server_config(&section);
        assert_eq!(config.http_addr(), "127.0.0.1:9999");
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(7));
        assert!(!config.keep_alive());
    }

    #[tokio::test]
    async fn test_open_store_failure() {
        let result = open_store("/nonexistent-dir/todos/db.sqlite").await;
        assert!(matches!(result, Err(LifecycleError::Store(_))));
    }

    #[tokio::test]
    async fn test_listener_failure_before_signal_is_fatal() {
        let failed = async {
            Err::<(), _>(ServerError::Accept(std::io::ErrorKind::InvalidInput.into()))
        };
        let err = until_shutdown_requested(failed, std::future::pending())
            .await
            .unwrap_err();
        assert!(
            matches!(err, LifecycleError::Listener(ServerError::Accept(_))),
            "{err}"
        );
    }

    #[tokio::test]
    async fn test_listener_stopping_before_signal_is_fatal() {
        let mut handle = todos_server::Server::builder()
            .http_addr("127.0.0.1:0")
            .build()
            .bind()
            .await
            .unwrap()
            .spawn();
        // Stops the accept task without a shutdown request.
        handle.close();

        let err = until_shutdown_requested(handle.finished(), std::future::pending())
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::ListenerStopped), "{err}");
    }

    #[tokio::test]
    async fn test_signal_while_serving_proceeds_to_drain() {
        let signal = ShutdownSignal::new();
        let requested = signal.recv();
        signal.trigger();

        let listener = std::future::pending::<Result<(), ServerError>>();
        until_shutdown_requested(listener, requested).await.unwrap();
    }

    #[test]
    fn test_new_orchestrator_is_initializing() {
        let orchestrator = Orchestrator::new(TodosConfig::default()).without_os_signals();
        assert_eq!(orchestrator.monitor().state(), LifecycleState::Initializing);
        assert!(!orchestrator.shutdown_signal().is_shutdown());
    }
}
