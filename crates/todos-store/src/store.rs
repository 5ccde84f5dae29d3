//! The SQLite-backed [`TodoStore`].

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{StoreError, StoreResult};
use crate::migrations::apply_migrations;
use crate::model::Todo;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const INSERT_TODO_SQL: &str = "INSERT INTO todos (title) VALUES (?1) RETURNING id, title";
const SELECT_TODO_SQL: &str = "SELECT id, title FROM todos WHERE id = ?1 LIMIT 1";
const LIST_TODOS_SQL: &str = "SELECT id, title FROM todos ORDER BY id";

/// Handle to the todo database.
///
/// Cloning is cheap; all clones share one connection. Once [`close`] has
/// been called every operation on every clone fails with
/// [`StoreError::Closed`].
///
/// [`close`]: TodoStore::close
#[derive(Debug, Clone)]
pub struct TodoStore {
    conn: Arc<Mutex<Option<Connection>>>,
    mode: &'static str,
}

impl TodoStore {
    /// Opens (creating if needed) the database file at `path` and applies
    /// pending migrations.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let started_at = Instant::now();
        tracing::info!(path = %path.display(), "Opening todo store");

        let conn = Connection::open(path)
            .map_err(StoreError::from)
            .and_then(bootstrap)
            .map_err(|e| {
                tracing::error!(
                    path = %path.display(),
                    duration_ms = duration_ms(started_at.elapsed()),
                    error = %e,
                    "Failed to open todo store"
                );
                e
            })?;

        tracing::info!(
            path = %path.display(),
            duration_ms = duration_ms(started_at.elapsed()),
            "Todo store ready"
        );
        Ok(Self::from_connection(conn, "file"))
    }

    /// Opens a private in-memory database. Mostly useful in tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = bootstrap(Connection::open_in_memory()?)?;
        tracing::debug!("In-memory todo store ready");
        Ok(Self::from_connection(conn, "memory"))
    }

    fn from_connection(conn: Connection, mode: &'static str) -> Self {
        Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            mode,
        }
    }

    /// Inserts a todo and returns it with its assigned id.
    pub async fn create_todo(&self, title: impl Into<String>) -> StoreResult<Todo> {
        let title = title.into();
        self.with_conn(move |conn| {
            let todo = conn.query_row(INSERT_TODO_SQL, params![title], Todo::from_row)?;
            Ok(todo)
        })
        .await
    }

    /// Fetches a todo by id.
    ///
    /// Returns [`StoreError::NotFound`] when no row has that id.
    pub async fn get_todo(&self, id: i64) -> StoreResult<Todo> {
        self.with_conn(move |conn| {
            conn.query_row(SELECT_TODO_SQL, params![id], Todo::from_row)
                .optional()?
                .ok_or(StoreError::NotFound(id))
        })
        .await
    }

    /// Lists every todo in ascending id order. The result may be empty.
    pub async fn list_todos(&self) -> StoreResult<Vec<Todo>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(LIST_TODOS_SQL)?;
            let todos = stmt
                .query_map([], Todo::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(todos)
        })
        .await
    }

    /// Closes the underlying connection.
    ///
    /// Waits for any query already holding the connection. Calling this
    /// more than once is a no-op.
    pub async fn close(&self) -> StoreResult<()> {
        let conn = Arc::clone(&self.conn);
        let mode = self.mode;
        tokio::task::spawn_blocking(move || {
            let Some(conn) = conn.lock().take() else {
                return Ok(());
            };
            conn.close().map_err(|(_, e)| StoreError::from(e))?;
            tracing::info!(mode, "Todo store closed");
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    /// Returns `true` once [`close`](Self::close) has released the connection.
    pub fn is_closed(&self) -> bool {
        self.conn.lock().is_none()
    }

    async fn with_conn<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            let conn = guard.as_ref().ok_or(StoreError::Closed)?;
            op(conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn bootstrap(mut conn: Connection) -> StoreResult<Connection> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    apply_migrations(&mut conn)?;
    Ok(conn)
}

#[allow(clippy::cast_possible_truncation)]
fn duration_ms(duration: Duration) -> u64 {
    duration.as_millis().min(u128::from(u64::MAX)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_ms_saturates() {
        assert_eq!(duration_ms(Duration::from_millis(1500)), 1500);
        assert_eq!(duration_ms(Duration::MAX), u64::MAX);
    }

    #[tokio::test]
    async fn test_create_assigns_increasing_ids() {
        let store = TodoStore::open_in_memory().unwrap();

        let first = store.create_todo("first").await.unwrap();
        let second = store.create_todo("second").await.unwrap();

        assert!(second.id > first.id);
        assert_eq!(first.title, "first");
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = TodoStore::open_in_memory().unwrap();
        let err = store.get_todo(999).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(999)));
    }

    #[tokio::test]
    async fn test_list_empty() {
        let store = TodoStore::open_in_memory().unwrap();
        assert!(store.list_todos().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let store = TodoStore::open_in_memory().unwrap();
        store.close().await.unwrap();
        store.close().await.unwrap();
        assert!(store.is_closed());
    }

    #[tokio::test]
    async fn test_operations_after_close_fail() {
        let store = TodoStore::open_in_memory().unwrap();
        let clone = store.clone();
        store.close().await.unwrap();

        assert!(matches!(
            clone.create_todo("late").await,
            Err(StoreError::Closed)
        ));
        assert!(matches!(clone.list_todos().await, Err(StoreError::Closed)));
    }
}
