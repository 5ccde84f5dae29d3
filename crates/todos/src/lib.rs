//! Todos - a small HTTP todo service
//!
//! Serves a JSON todo list backed by SQLite and shuts down gracefully on
//! SIGINT/SIGTERM: the listener stops accepting, in-flight requests get a
//! bounded window to finish, then the store is closed.
//!
//! # Endpoints
//!
//! | Method | Path | Behavior |
//! |---|---|---|
//! | `GET` | `/` | `Hello, World!` |
//! | `GET` | `/todos` | all todos in id order |
//! | `POST` | `/todos` | create from `{"title": "..."}` |
//! | `GET` | `/todos/{id}` | one todo |
//!
//! # Example
//!
//! ```no_run
//! use todos::Orchestrator;
//! use todos_config::TodosConfig;
//!
//! # async fn run() -> Result<(), todos::LifecycleError> {
//! Orchestrator::new(TodosConfig::default()).run().await
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod app;
pub mod error;
pub mod handlers;
pub mod orchestrator;

pub use error::{LifecycleError, LifecycleResult};
pub use handlers::TodoHandlers;
pub use orchestrator::Orchestrator;

/// Version of the todos service.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
