//! # Todos Store
//!
//! SQLite persistence for the todos service.
//!
//! The store owns a single SQLite connection and exposes the three
//! operations the HTTP layer needs:
//!
//! - [`TodoStore::create_todo`] - insert a todo and return it
//! - [`TodoStore::get_todo`] - fetch a todo by id
//! - [`TodoStore::list_todos`] - list every todo in id order
//!
//! All operations are async and run on tokio's blocking pool, so request
//! tasks never block the reactor while SQLite works. The connection is
//! guarded by a mutex; callers may share a cloned [`TodoStore`] freely.
//!
//! ## Example
//!
//! ```rust,ignore
//! use todos_store::TodoStore;
//!
//! let store = TodoStore::open("db.sqlite")?;
//! let todo = store.create_todo("buy milk").await?;
//! assert_eq!(store.get_todo(todo.id).await?, todo);
//! store.close().await?;
//! ```

#![doc(html_root_url = "https://docs.rs/todos-store/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod migrations;
pub mod model;
mod store;

pub use error::{StoreError, StoreResult};
pub use model::{NewTodo, Todo};
pub use store::TodoStore;
