//! Todo request handlers.
//!
//! Each handler decodes its input, performs one store operation and writes
//! the outcome. Failures never leave the handler: they become responses.
//!
//! | Outcome | Response |
//! |---|---|
//! | success | `200`, JSON body |
//! | body does not start with a JSON object or `null` | `400`, decoder message |
//! | id is not an integer | `500`, parse message |
//! | no such todo, or no todos at all | `404 Not Found` |
//! | any other store error | `500`, error message |

use http::StatusCode;
use todos_server::response::{self, HttpResponse};
use todos_server::{HandlerRegistry, HandlerRequest};
use todos_store::{NewTodo, StoreError, TodoStore};

/// Operation id of `GET /`.
pub const INDEX: &str = "index";
/// Operation id of `GET /todos`.
pub const LIST_TODOS: &str = "listTodos";
/// Operation id of `POST /todos`.
pub const CREATE_TODO: &str = "createTodo";
/// Operation id of `GET /todos/{id}`.
pub const GET_TODO: &str = "getTodo";

/// Handlers bound to one store.
#[derive(Debug, Clone)]
pub struct TodoHandlers {
    store: TodoStore,
}

impl TodoHandlers {
    /// Creates handlers backed by `store`.
    #[must_use]
    pub fn new(store: TodoStore) -> Self {
        Self { store }
    }

    /// Registers every handler under its operation id.
    pub fn register(self, registry: &mut HandlerRegistry) {
        registry.register(INDEX, |_req: HandlerRequest| async { index() });

        let handlers = self.clone();
        registry.register(LIST_TODOS, move |_req: HandlerRequest| {
            let handlers = handlers.clone();
            async move { handlers.list_todos().await }
        });

        let handlers = self.clone();
        registry.register(CREATE_TODO, move |req: HandlerRequest| {
            let handlers = handlers.clone();
            async move { handlers.create_todo(&req).await }
        });

        registry.register(GET_TODO, move |req: HandlerRequest| {
            let handlers = self.clone();
            async move { handlers.get_todo(req.param("id").unwrap_or_default()).await }
        });
    }

    /// `POST /todos`.
    pub async fn create_todo(&self, req: &HandlerRequest) -> HttpResponse {
        // `null` decodes like `{}`.
        let new_todo: NewTodo = match req.json::<Option<NewTodo>>() {
            Ok(new_todo) => new_todo.unwrap_or_default(),
            Err(e) => return response::error(StatusCode::BAD_REQUEST, e.to_string()),
        };

        match self.store.create_todo(new_todo.title).await {
            Ok(todo) => response::json(&todo),
            Err(e) => store_failure(&e),
        }
    }

    /// `GET /todos/{id}`.
    ///
    /// An id that is not an integer is answered with `500`, not `400`.
    pub async fn get_todo(&self, raw_id: &str) -> HttpResponse {
        let id: i64 = match raw_id.parse() {
            Ok(id) => id,
            Err(e) => {
                return response::error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("invalid todo id {raw_id:?}: {e}"),
                )
            }
        };

        match self.store.get_todo(id).await {
            Ok(todo) => response::json(&todo),
            Err(e) if e.is_not_found() => not_found(),
            Err(e) => store_failure(&e),
        }
    }

    /// `GET /todos`.
    ///
    /// An empty table is answered with `404`, not an empty array.
    pub async fn list_todos(&self) -> HttpResponse {
        match self.store.list_todos().await {
            Ok(todos) if todos.is_empty() => not_found(),
            Ok(todos) => response::json(&todos),
            Err(e) => store_failure(&e),
        }
    }
}

/// `GET /`.
#[must_use]
pub fn index() -> HttpResponse {
    response::text(StatusCode::OK, "Hello, World!")
}

fn not_found() -> HttpResponse {
    response::error(StatusCode::NOT_FOUND, "Not Found")
}

fn store_failure(e: &StoreError) -> HttpResponse {
    tracing::error!(error = %e, "Store operation failed");
    response::error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http_body_util::BodyExt;
    use todos_store::Todo;

    use super::*;

    fn handlers() -> TodoHandlers {
        TodoHandlers::new(TodoStore::open_in_memory().unwrap())
    }

    fn body_request(body: &'static str) -> HandlerRequest {
        HandlerRequest::new(Default::default(), Bytes::from_static(body.as_bytes()))
    }

    async fn body_string(response: HttpResponse) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_index() {
        let response = index();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "Hello, World!");
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let handlers = handlers();

        let created = handlers
            .create_todo(&body_request(r#"{"title":"buy milk"}"#))
            .await;
        assert_eq!(created.status(), StatusCode::OK);
        let todo: Todo = serde_json::from_str(&body_string(created).await).unwrap();
        assert_eq!(todo.title, "buy milk");

        let fetched = handlers.get_todo(&todo.id.to_string()).await;
        assert_eq!(fetched.status(), StatusCode::OK);
        let again: Todo = serde_json::from_str(&body_string(fetched).await).unwrap();
        assert_eq!(again, todo);
    }

    #[tokio::test]
    async fn test_create_malformed_body() {
        let response = handlers().create_todo(&body_request("{not json")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(response).await.ends_with('\n'));
    }

    #[tokio::test]
    async fn test_create_wrong_shape() {
        let response = handlers().create_todo(&body_request(r#"{"title":7}"#)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_lenient_bodies() {
        let handlers = handlers();

        for body in ["{}", "null", r#"{"title":null}"#, r#"{"title":"a"} trailing"#] {
            let response = handlers.create_todo(&body_request(body)).await;
            assert_eq!(response.status(), StatusCode::OK, "body {body:?}");
        }

        let response = handlers.list_todos().await;
        let todos: Vec<Todo> = serde_json::from_str(&body_string(response).await).unwrap();
        let titles: Vec<_> = todos.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["", "", "", "a"]);
    }

    #[tokio::test]
    async fn test_create_empty_body() {
        let response = handlers().create_todo(&body_request("")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(response).await, "EOF\n");
    }

    #[tokio::test]
    async fn test_get_missing() {
        let response = handlers().get_todo("999").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(response).await, "Not Found\n");
    }

    #[tokio::test]
    async fn test_get_non_integer_id() {
        let response = handlers().get_todo("abc").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_string(response).await.contains("abc"));
    }

    #[tokio::test]
    async fn test_list_empty_is_not_found() {
        let response = handlers().list_todos().await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_in_id_order() {
        let handlers = handlers();
        handlers.create_todo(&body_request(r#"{"title":"a"}"#)).await;
        handlers.create_todo(&body_request(r#"{"title":"b"}"#)).await;

        let response = handlers.list_todos().await;
        assert_eq!(response.status(), StatusCode::OK);
        let todos: Vec<Todo> = serde_json::from_str(&body_string(response).await).unwrap();
        let titles: Vec<_> = todos.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["a", "b"]);
    }

    #[tokio::test]
    async fn test_closed_store_is_server_error() {
        let store = TodoStore::open_in_memory().unwrap();
        let handlers = TodoHandlers::new(store.clone());
        store.close().await.unwrap();

        let response = handlers.list_todos().await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(response).await, "store is closed\n");
    }

    #[test]
    fn test_register_all_operations() {
        let mut registry = HandlerRegistry::new();
        handlers().register(&mut registry);

        for op in [INDEX, LIST_TODOS, CREATE_TODO, GET_TODO] {
            assert!(registry.contains(op), "{op} not registered");
        }
    }
}
