//! Route table and server assembly.

use http::Method;
use todos_server::{HandlerRegistry, Router, Server, ServerConfig};
use todos_store::TodoStore;

use crate::handlers::{self, TodoHandlers};

/// Builds the service's routing table.
#[must_use]
pub fn routes() -> Router {
    let mut router = Router::new();
    router.add_route(Method::GET, "/", handlers::INDEX);
    router.add_route(Method::GET, "/todos", handlers::LIST_TODOS);
    router.add_route(Method::POST, "/todos", handlers::CREATE_TODO);
    router.add_route(Method::GET, "/todos/{id}", handlers::GET_TODO);
    router
}

/// Builds an unbound server serving the todo API from `store`.
#[must_use]
pub fn build_server(config: &ServerConfig, store: TodoStore) -> Server {
    let mut registry = HandlerRegistry::new();
    TodoHandlers::new(store).register(&mut registry);

    Server::builder()
        .config(config)
        .router(routes())
        .handlers(registry)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_route_has_a_handler() {
        let store = TodoStore::open_in_memory().unwrap();
        let server = build_server(&ServerConfig::default(), store);

        for op in server.router().operation_ids() {
            assert!(server.handlers().contains(op), "no handler for {op}");
        }
        assert_eq!(server.router().route_count(), 4);
    }

    #[test]
    fn test_routes() {
        let router = routes();
        let m = router.match_route(&Method::GET, "/todos/42").unwrap();
        assert_eq!(m.operation_id(), handlers::GET_TODO);
        assert_eq!(m.param("id"), Some("42"));
        assert_eq!(
            router.allowed_methods("/todos"),
            vec![Method::GET, Method::POST]
        );
    }
}
