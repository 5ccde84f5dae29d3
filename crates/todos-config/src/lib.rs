//! Typed configuration for the todos service.
//!
//! - TOML and JSON configuration files
//! - `.env` files and environment variable overrides
//! - Strict parsing (fails on unknown fields)
//! - Layered configuration (defaults → file → env)
//!
//! # Example
//!
//! ```no_run
//! use todos_config::ConfigLoader;
//!
//! # fn main() -> Result<(), todos_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_file("todos.toml")?
//!     .with_env_prefix("TODOS")
//!     .load()?;
//!
//! println!("Server will listen on: {}", config.server.http_addr);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! http_addr = "0.0.0.0:8080"
//! shutdown_timeout_secs = 30
//! keep_alive = true
//!
//! [store]
//! path = "db.sqlite"
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```
//!
//! # Environment Variable Overrides
//!
//! Every value can be overridden with `PREFIX__SECTION__KEY`:
//!
//! - `TODOS__SERVER__HTTP_ADDR=127.0.0.1:9000`
//! - `TODOS__STORE__PATH=/var/lib/todos/db.sqlite`
//! - `TODOS__LOGGING__FORMAT=pretty`

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::TodosConfig;
pub use error::ConfigError;
pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX};
pub use schema::*;
