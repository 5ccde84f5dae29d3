//! # Todos Server
//!
//! HTTP server plumbing for the todos service:
//!
//! - HTTP/1.1 via Hyper on Tokio
//! - Static request routing and a handler registry keyed by operation id
//! - Latched shutdown signal with revocable OS signal registration
//! - Bounded graceful drain of open connections
//! - Observable lifecycle state
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use todos_server::{Server, ShutdownSignal};
//!
//! let shutdown = ShutdownSignal::new();
//! let _signals = shutdown.register_os_signals()?;
//!
//! let mut handle = Server::builder()
//!     .http_addr("0.0.0.0:8080")
//!     .build()
//!     .bind()
//!     .await?
//!     .spawn();
//!
//! shutdown.recv().await;
//! handle.shutdown(Duration::from_secs(30)).await?;
//! handle.close();
//! handle.wait().await?;
//! ```

#![doc(html_root_url = "https://docs.rs/todos-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod handler;
pub mod lifecycle;
pub mod response;
pub mod router;
mod server;
pub mod shutdown;

pub use config::{ServerConfig, ServerConfigBuilder};
pub use handler::{HandlerRegistry, HandlerRequest};
pub use lifecycle::{InvalidTransition, Lifecycle, LifecycleMonitor, LifecycleState};
pub use response::HttpResponse;
pub use router::{RouteMatch, Router};
pub use server::{BoundServer, Server, ServerBuilder, ServerError, ServerHandle};
pub use shutdown::{
    ConnectionToken, ConnectionTracker, ShutdownSignal, SignalRegistration, TerminationSignal,
};
