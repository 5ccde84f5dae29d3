//! HTTP server implementation.
//!
//! Built on Hyper and Tokio. Serving happens in three explicit steps so the
//! caller owns the ordering of startup and shutdown:
//!
//! 1. [`Server::bind`] binds the listening socket (a bind failure is
//!    reported here, before anything runs in the background).
//! 2. [`BoundServer::spawn`] starts the accept loop on a background task and
//!    returns a [`ServerHandle`].
//! 3. [`ServerHandle::shutdown`] drains with a ceiling,
//!    [`ServerHandle::close`] force-closes leftovers and
//!    [`ServerHandle::wait`] joins the accept task.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use todos_server::Server;
//!
//! let mut handle = Server::builder()
//!     .http_addr("127.0.0.1:8080")
//!     .build()
//!     .bind()
//!     .await?
//!     .spawn();
//!
//! handle.shutdown(Duration::from_secs(30)).await?;
//! handle.close();
//! handle.wait().await?;
//! ```

use std::convert::Infallible;
use std::net::{AddrParseError, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::{Request, StatusCode};
use http_body_util::BodyExt;
use hyper::body::{Body, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::{ServerConfig, ServerConfigBuilder};
use crate::handler::{HandlerRegistry, HandlerRequest};
use crate::response::{self, HttpResponse};
use crate::router::Router;
use crate::shutdown::{ConnectionToken, ConnectionTracker, ShutdownSignal};

/// Initial delay after an accept error caused by resource exhaustion.
const ACCEPT_BACKOFF_MIN: Duration = Duration::from_millis(5);

/// Upper bound for the accept back-off.
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// `ENOMEM`, `ENFILE`, `EMFILE`, `ENOBUFS`.
#[cfg(target_os = "linux")]
const RESOURCE_EXHAUSTION_CODES: &[i32] = &[12, 23, 24, 105];

/// `ENOMEM`, `ENFILE`, `EMFILE`, `ENOBUFS`.
#[cfg(all(unix, not(target_os = "linux")))]
const RESOURCE_EXHAUSTION_CODES: &[i32] = &[12, 23, 24, 55];

/// `WSAEMFILE`, `WSAENOBUFS`.
#[cfg(windows)]
const RESOURCE_EXHAUSTION_CODES: &[i32] = &[10024, 10055];

#[cfg(not(any(unix, windows)))]
const RESOURCE_EXHAUSTION_CODES: &[i32] = &[];

/// The HTTP server, fully configured but not yet bound.
///
/// Routes and handlers are fixed once the server is built.
///
/// # Example
///
/// ```rust
/// use http::{Method, StatusCode};
/// use todos_server::{response, HandlerRegistry, HandlerRequest, Router, Server};
///
/// let mut router = Router::new();
/// router.add_route(Method::GET, "/", "index");
///
/// let mut handlers = HandlerRegistry::new();
/// handlers.register("index", |_req: HandlerRequest| async {
///     response::text(StatusCode::OK, "Hello, World!")
/// });
///
/// let server = Server::builder()
///     .http_addr("127.0.0.1:0")
///     .router(router)
///     .handlers(handlers)
///     .build();
/// assert_eq!(server.router().route_count(), 1);
/// ```
#[derive(Debug)]
pub struct Server {
    /// Server configuration
    config: ServerConfig,

    /// Request routing and dispatch
    dispatcher: Arc<Dispatcher>,
}

impl Server {
    /// Creates a server with the given configuration and no routes.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            dispatcher: Arc::new(Dispatcher {
                router: Router::new(),
                handlers: HandlerRegistry::new(),
            }),
        }
    }

    /// Creates a new server builder.
    #[must_use]
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// Returns a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns a reference to the router.
    #[must_use]
    pub fn router(&self) -> &Router {
        &self.dispatcher.router
    }

    /// Returns a reference to the handler registry.
    #[must_use]
    pub fn handlers(&self) -> &HandlerRegistry {
        &self.dispatcher.handlers
    }

    /// Binds the listening socket.
    ///
    /// Nothing is accepted until [`BoundServer::spawn`] is called.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured address cannot be parsed or the
    /// socket cannot be bound.
    pub async fn bind(self) -> Result<BoundServer, ServerError> {
        let addr = self
            .config
            .socket_addr()
            .map_err(|source| ServerError::InvalidAddress {
                addr: self.config.http_addr().to_string(),
                source,
            })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        tracing::info!(%local_addr, "Server listening");

        Ok(BoundServer {
            config: self.config,
            dispatcher: self.dispatcher,
            listener,
            local_addr,
        })
    }
}

/// A server whose socket is bound but which is not accepting yet.
#[derive(Debug)]
pub struct BoundServer {
    config: ServerConfig,
    dispatcher: Arc<Dispatcher>,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl BoundServer {
    /// Returns the address actually bound (resolves port `0`).
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Starts accepting connections on a background task.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn spawn(self) -> ServerHandle {
        let stop = ShutdownSignal::new();
        let force = ShutdownSignal::new();
        let tracker = ConnectionTracker::new();
        let (listener_closed_tx, listener_closed) = watch::channel(false);

        let accept = AcceptLoop {
            listener: self.listener,
            dispatcher: self.dispatcher,
            keep_alive: self.config.keep_alive(),
            tracker: tracker.clone(),
            stop: stop.clone(),
            force: force.clone(),
            listener_closed: listener_closed_tx,
        };

        ServerHandle {
            local_addr: self.local_addr,
            stop,
            force,
            tracker,
            listener_closed,
            task: Some(tokio::spawn(accept.run())),
        }
    }
}

/// Control handle for a running server.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    stop: ShutdownSignal,
    force: ShutdownSignal,
    tracker: ConnectionTracker,
    listener_closed: watch::Receiver<bool>,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

impl ServerHandle {
    /// Returns the bound address.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the number of open connections.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.tracker.active_connections()
    }

    /// Completes when the accept task ends.
    ///
    /// The task only ends without [`shutdown`](Self::shutdown) or
    /// [`close`](Self::close) if accepting failed for good, so callers
    /// racing this against a shutdown request treat completion as fatal.
    /// Once this has returned, [`wait`](Self::wait) reports `Ok(())`.
    ///
    /// Cancel safe.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Accept`] if the listener failed and
    /// [`ServerError::Task`] if the accept task panicked.
    pub async fn finished(&mut self) -> Result<(), ServerError> {
        let Some(task) = self.task.as_mut() else {
            return Ok(());
        };
        let result = task.await;
        self.task = None;
        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(ServerError::Accept(source)),
            Err(e) => Err(ServerError::Task(e.to_string())),
        }
    }

    /// Stops accepting and drains open connections, bounded by `ceiling`.
    ///
    /// The listening socket is released before the ceiling starts to run.
    /// Idle keep-alive connections close at once; connections with a request
    /// in flight close after writing its response.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::DrainTimeout`] if connections were still open
    /// when the ceiling expired. Those connections have been force-closed.
    pub async fn shutdown(&mut self, ceiling: Duration) -> Result<(), ServerError> {
        self.stop.trigger();

        // Err means the accept task is gone, which also released the socket.
        let _ = self.listener_closed.wait_for(|closed| *closed).await;

        tracing::info!(
            active_connections = self.tracker.active_connections(),
            ceiling_ms = duration_ms(ceiling),
            "Listener closed, draining connections"
        );

        let started = Instant::now();
        if tokio::time::timeout(ceiling, self.tracker.wait_for_shutdown())
            .await
            .is_ok()
        {
            tracing::info!(
                duration_ms = duration_ms(started.elapsed()),
                "All connections drained"
            );
            return Ok(());
        }

        let remaining = self.tracker.active_connections();
        tracing::warn!(
            remaining,
            ceiling_ms = duration_ms(ceiling),
            "Drain ceiling reached, force-closing connections"
        );
        self.force.trigger();
        Err(ServerError::DrainTimeout { remaining, ceiling })
    }

    /// Stops accepting and force-closes every open connection. Idempotent.
    pub fn close(&self) {
        self.stop.trigger();
        self.force.trigger();
    }

    /// Waits for the accept task to finish.
    ///
    /// Returns once the listener has been released; call after
    /// [`shutdown`](Self::shutdown) or [`close`](Self::close).
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Accept`] if the listener had failed and
    /// [`ServerError::Task`] if the accept task panicked.
    pub async fn wait(mut self) -> Result<(), ServerError> {
        self.finished().await
    }
}

/// Routing and handler dispatch shared by every connection.
#[derive(Debug)]
struct Dispatcher {
    router: Router,
    handlers: HandlerRegistry,
}

impl Dispatcher {
    /// Handles one request and logs its outcome.
    async fn handle<B>(&self, req: Request<B>) -> HttpResponse
    where
        B: Body,
        B::Error: std::fmt::Display,
    {
        let started = Instant::now();
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        let response = self.dispatch(req).await;

        tracing::info!(
            method = %method,
            path = %path,
            status = response.status().as_u16(),
            duration_ms = duration_ms(started.elapsed()),
            "Request completed"
        );
        response
    }

    async fn dispatch<B>(&self, req: Request<B>) -> HttpResponse
    where
        B: Body,
        B::Error: std::fmt::Display,
    {
        let Some(route) = self.router.match_route(req.method(), req.uri().path()) else {
            let allowed = self.router.allowed_methods(req.uri().path());
            if allowed.is_empty() {
                return response::not_found();
            }
            return response::method_not_allowed(&allowed);
        };

        let body = match req.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                tracing::debug!(error = %e, "Failed to read request body");
                return response::error(
                    StatusCode::BAD_REQUEST,
                    format!("failed to read request body: {e}"),
                );
            }
        };

        let operation_id = route.operation_id().to_string();
        let request = HandlerRequest::new(route.into_params(), body);
        match self.handlers.invoke(&operation_id, request).await {
            Some(response) => response,
            None => {
                tracing::warn!(operation_id = %operation_id, "No handler registered for operation");
                response::error(StatusCode::NOT_IMPLEMENTED, "Not Implemented")
            }
        }
    }
}

/// State owned by the background accept task.
struct AcceptLoop {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    keep_alive: bool,
    tracker: ConnectionTracker,
    stop: ShutdownSignal,
    force: ShutdownSignal,
    listener_closed: watch::Sender<bool>,
}

impl AcceptLoop {
    /// Accepts until stopped. Returns an error if the listener fails in a
    /// way retrying cannot fix.
    async fn run(self) -> std::io::Result<()> {
        let Self {
            listener,
            dispatcher,
            keep_alive,
            tracker,
            stop,
            force,
            listener_closed,
        } = self;

        let stopped = stop.recv();
        tokio::pin!(stopped);
        let mut backoff = ACCEPT_BACKOFF_MIN;

        let result = loop {
            tokio::select! {
                biased;

                () = &mut stopped => break Ok(()),

                result = listener.accept() => match result {
                    Ok((stream, remote_addr)) => {
                        backoff = ACCEPT_BACKOFF_MIN;
                        // Counted before the task exists so a drain never
                        // misses a connection that was just accepted.
                        let token = tracker.acquire();
                        tokio::spawn(serve_connection(
                            stream,
                            remote_addr,
                            Arc::clone(&dispatcher),
                            keep_alive,
                            stop.clone(),
                            force.clone(),
                            token,
                        ));
                    }
                    Err(e) => match AcceptFailure::classify(&e) {
                        AcceptFailure::Connection => {
                            tracing::debug!(error = %e, "Connection failed during accept");
                        }
                        AcceptFailure::Exhausted => {
                            tracing::warn!(error = %e, retry_ms = duration_ms(backoff), "Out of resources accepting connection");
                            tokio::select! {
                                () = &mut stopped => break Ok(()),
                                () = tokio::time::sleep(backoff) => {}
                            }
                            backoff = (backoff * 2).min(ACCEPT_BACKOFF_MAX);
                        }
                        AcceptFailure::Fatal => {
                            tracing::error!(error = %e, "Listener failed");
                            break Err(e);
                        }
                    },
                },
            }
        };

        drop(listener);
        let _ = listener_closed.send(true);
        tracing::info!("Stopped accepting connections");
        result
    }
}

/// Serves one connection until it completes, is drained, or is force-closed.
async fn serve_connection(
    stream: TcpStream,
    remote_addr: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    keep_alive: bool,
    stop: ShutdownSignal,
    force: ShutdownSignal,
    token: ConnectionToken,
) {
    let service = service_fn(move |req: Request<Incoming>| {
        let dispatcher = Arc::clone(&dispatcher);
        async move { Ok::<_, Infallible>(dispatcher.handle(req).await) }
    });

    let conn = http1::Builder::new()
        .keep_alive(keep_alive)
        .serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let stopped = stop.recv();
    let forced = force.recv();
    tokio::pin!(stopped);
    tokio::pin!(forced);

    tokio::select! {
        result = conn.as_mut() => {
            log_connection_result(remote_addr, result);
            return;
        }
        () = &mut forced => {
            tracing::debug!(%remote_addr, "Connection force-closed");
            return;
        }
        () = &mut stopped => conn.as_mut().graceful_shutdown(),
    }

    tokio::select! {
        result = conn.as_mut() => log_connection_result(remote_addr, result),
        () = &mut forced => tracing::debug!(%remote_addr, "Connection force-closed during drain"),
    }

    drop(token);
}

fn log_connection_result(remote_addr: SocketAddr, result: Result<(), hyper::Error>) {
    if let Err(e) = result {
        tracing::debug!(%remote_addr, error = %e, "Connection error");
    }
}

/// How the accept loop reacts to a failed `accept`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AcceptFailure {
    /// Tied to a single peer; the listener itself is fine.
    Connection,
    /// Out of descriptors or buffers; retry after a back-off.
    Exhausted,
    /// The listener is unusable.
    Fatal,
}

impl AcceptFailure {
    fn classify(e: &std::io::Error) -> Self {
        use std::io::ErrorKind;

        match e.kind() {
            ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionReset
            | ErrorKind::Interrupted => Self::Connection,
            ErrorKind::OutOfMemory => Self::Exhausted,
            _ if e
                .raw_os_error()
                .is_some_and(|code| RESOURCE_EXHAUSTION_CODES.contains(&code)) =>
            {
                Self::Exhausted
            }
            _ => Self::Fatal,
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn duration_ms(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

/// Builder for configuring and creating a [`Server`].
///
/// # Example
///
/// ```rust
/// use todos_server::ServerBuilder;
/// use std::time::Duration;
///
/// let server = ServerBuilder::new()
///     .http_addr("0.0.0.0:9090")
///     .shutdown_timeout(Duration::from_secs(60))
///     .build();
/// assert_eq!(server.config().http_addr(), "0.0.0.0:9090");
/// ```
#[derive(Debug, Default)]
pub struct ServerBuilder {
    config_builder: ServerConfigBuilder,
    router: Option<Router>,
    handlers: Option<HandlerRegistry>,
}

impl ServerBuilder {
    /// Creates a new server builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole server configuration.
    #[must_use]
    pub fn config(mut self, config: &ServerConfig) -> Self {
        self.config_builder = ServerConfigBuilder::new()
            .http_addr(config.http_addr())
            .shutdown_timeout(config.shutdown_timeout())
            .keep_alive(config.keep_alive());
        self
    }

    /// Sets the HTTP bind address.
    #[must_use]
    pub fn http_addr(mut self, addr: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.http_addr(addr);
        self
    }

    /// Sets the drain ceiling.
    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config_builder = self.config_builder.shutdown_timeout(timeout);
        self
    }

    /// Enables or disables HTTP/1.1 keep-alive.
    #[must_use]
    pub fn keep_alive(mut self, enabled: bool) -> Self {
        self.config_builder = self.config_builder.keep_alive(enabled);
        self
    }

    /// Sets the routing table.
    #[must_use]
    pub fn router(mut self, router: Router) -> Self {
        self.router = Some(router);
        self
    }

    /// Sets the handler registry.
    #[must_use]
    pub fn handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = Some(handlers);
        self
    }

    /// Builds the server with the configured settings.
    #[must_use]
    pub fn build(self) -> Server {
        Server {
            config: self.config_builder.build(),
            dispatcher: Arc::new(Dispatcher {
                router: self.router.unwrap_or_default(),
                handlers: self.handlers.unwrap_or_default(),
            }),
        }
    }
}

/// Server error types.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The configured address is not a socket address.
    #[error("invalid listen address '{addr}': {source}")]
    InvalidAddress {
        /// Address as configured
        addr: String,
        /// Parse failure
        source: AddrParseError,
    },

    /// Failed to bind to the configured address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that could not be bound
        addr: SocketAddr,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Connections were still open when the drain ceiling expired.
    #[error("drain ceiling of {ceiling:?} reached with {remaining} connection(s) open")]
    DrainTimeout {
        /// Connections force-closed at expiry
        remaining: usize,
        /// The ceiling that expired
        ceiling: Duration,
    },

    /// The listener failed and stopped accepting.
    #[error("listener stopped accepting: {0}")]
    Accept(#[source] std::io::Error),

    /// The accept task panicked or was cancelled.
    #[error("accept task failed: {0}")]
    Task(String),
}
