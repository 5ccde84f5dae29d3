//! Observability setup for the todos service.
//!
//! Every crate in the workspace logs through `tracing` macros; this crate
//! owns the one place that decides where those events go. Output is JSON in
//! production and pretty-printed in development, filtered by level.
//!
//! # Example
//!
//! ```rust,ignore
//! use todos_telemetry::{init_logging, LogConfig};
//!
//! fn main() -> Result<(), todos_telemetry::TelemetryError> {
//!     init_logging(&LogConfig::development())?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
