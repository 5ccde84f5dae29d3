//! Static request routing.
//!
//! The router maps a method and path to an operation id. It is filled once
//! while the server is being built and is read-only once the server runs.
//! Path templates use `{name}` placeholders for single segments.
//!
//! # Example
//!
//! ```rust
//! use todos_server::Router;
//! use http::Method;
//!
//! let mut router = Router::new();
//! router.add_route(Method::GET, "/todos/{id}", "getTodo");
//!
//! let m = router.match_route(&Method::GET, "/todos/7").unwrap();
//! assert_eq!(m.operation_id(), "getTodo");
//! assert_eq!(m.param("id"), Some("7"));
//! ```

use std::collections::HashMap;

use http::Method;

/// A matched route with extracted path parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    operation_id: String,
    params: HashMap<String, String>,
}

impl RouteMatch {
    /// Creates a new route match.
    #[must_use]
    pub fn new(operation_id: impl Into<String>, params: HashMap<String, String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            params,
        }
    }

    /// Returns the operation id for this route.
    #[must_use]
    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    /// Returns the extracted path parameters.
    #[must_use]
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// Returns a specific path parameter by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub(crate) fn into_params(self) -> HashMap<String, String> {
        self.params
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathSegment {
    Literal(String),
    Param(String),
}

#[derive(Debug, Clone)]
struct Route {
    method: Method,
    segments: Vec<PathSegment>,
    operation_id: String,
}

impl Route {
    fn new(method: Method, pattern: &str, operation_id: impl Into<String>) -> Self {
        let segments = split_path(pattern)
            .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => PathSegment::Param(name.to_string()),
                None => PathSegment::Literal(s.to_string()),
            })
            .collect();

        Self {
            method,
            segments,
            operation_id: operation_id.into(),
        }
    }

    /// Returns extracted parameters if the route matches `path`.
    fn match_path(&self, path: &str) -> Option<HashMap<String, String>> {
        let actual: Vec<&str> = split_path(path).collect();
        if actual.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (pattern, raw) in self.segments.iter().zip(actual) {
            // Segments are compared and captured percent-decoded.
            let value = urlencoding::decode(raw).ok()?;
            match pattern {
                PathSegment::Literal(expected) if *expected != value => return None,
                PathSegment::Literal(_) => {}
                PathSegment::Param(name) => {
                    params.insert(name.clone(), value.into_owned());
                }
            }
        }
        Some(params)
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// HTTP request router.
///
/// Routes are checked in registration order; the first match wins.
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Creates a new empty router.
    #[must_use]
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Adds a route.
    ///
    /// # Arguments
    ///
    /// * `method` - HTTP method for this route
    /// * `pattern` - Path pattern (e.g., "/todos/{id}")
    /// * `operation_id` - Operation the route dispatches to
    pub fn add_route(
        &mut self,
        method: Method,
        pattern: impl AsRef<str>,
        operation_id: impl Into<String>,
    ) {
        self.routes
            .push(Route::new(method, pattern.as_ref(), operation_id));
    }

    /// Returns the number of registered routes.
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Matches a request to a route.
    #[must_use]
    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        self.routes
            .iter()
            .filter(|route| route.method == *method)
            .find_map(|route| {
                route
                    .match_path(path)
                    .map(|params| RouteMatch::new(&route.operation_id, params))
            })
    }

    /// Returns the methods registered for `path`, in registration order.
    ///
    /// An empty result means no route knows the path at all; a non-empty
    /// one lets the server answer `405 Method Not Allowed`.
    #[must_use]
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        let mut methods: Vec<Method> = Vec::new();
        for route in &self.routes {
            if route.match_path(path).is_some() && !methods.contains(&route.method) {
                methods.push(route.method.clone());
            }
        }
        methods
    }

    /// Checks if an operation id is routed.
    #[must_use]
    pub fn has_operation(&self, operation_id: &str) -> bool {
        self.routes.iter().any(|r| r.operation_id == operation_id)
    }

    /// Returns all routed operation ids.
    pub fn operation_ids(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|r| r.operation_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn todo_router() -> Router {
        let mut router = Router::new();
        router.add_route(Method::GET, "/", "index");
        router.add_route(Method::GET, "/todos", "listTodos");
        router.add_route(Method::POST, "/todos", "createTodo");
        router.add_route(Method::GET, "/todos/{id}", "getTodo");
        router
    }

    #[test]
    fn test_router_new() {
        assert_eq!(Router::new().route_count(), 0);
        assert_eq!(Router::default().route_count(), 0);
    }

    #[test]
    fn test_match_root() {
        let router = todo_router();
        let m = router.match_route(&Method::GET, "/").unwrap();
        assert_eq!(m.operation_id(), "index");
        assert!(m.params().is_empty());
    }

    #[test]
    fn test_params_are_percent_decoded() {
        let router = todo_router();

        let m = router.match_route(&Method::GET, "/todos/%31").unwrap();
        assert_eq!(m.param("id"), Some("1"));

        let m = router.match_route(&Method::GET, "/todos/a%20b").unwrap();
        assert_eq!(m.param("id"), Some("a b"));

        let m = router.match_route(&Method::GET, "/tod%6Fs").unwrap();
        assert_eq!(m.operation_id(), "listTodos");

        // Not UTF-8 once decoded.
        assert!(router.match_route(&Method::GET, "/todos/%FF").is_none());
    }

    #[test]
    fn test_same_path_different_methods() {
        let router = todo_router();

        let get = router.match_route(&Method::GET, "/todos").unwrap();
        assert_eq!(get.operation_id(), "listTodos");

        let post = router.match_route(&Method::POST, "/todos").unwrap();
        assert_eq!(post.operation_id(), "createTodo");
    }

    #[test]
    fn test_match_with_param() {
        let router = todo_router();
        let m = router.match_route(&Method::GET, "/todos/123").unwrap();
        assert_eq!(m.operation_id(), "getTodo");
        assert_eq!(m.param("id"), Some("123"));
        assert_eq!(m.param("other"), None);
    }

    #[test]
    fn test_param_is_not_parsed() {
        let router = todo_router();
        let m = router.match_route(&Method::GET, "/todos/abc").unwrap();
        assert_eq!(m.param("id"), Some("abc"));
    }

    #[test]
    fn test_segment_count_mismatch() {
        let router = todo_router();
        assert!(router.match_route(&Method::GET, "/todos/1/extra").is_none());
        assert!(router.match_route(&Method::GET, "/nope").is_none());
    }

    #[test]
    fn test_method_mismatch() {
        let router = todo_router();
        assert!(router.match_route(&Method::DELETE, "/todos/1").is_none());
    }

    #[test]
    fn test_trailing_slash_is_normalized() {
        let router = todo_router();
        let m = router.match_route(&Method::GET, "/todos/").unwrap();
        assert_eq!(m.operation_id(), "listTodos");
    }

    #[test]
    fn test_allowed_methods() {
        let router = todo_router();
        assert_eq!(
            router.allowed_methods("/todos"),
            vec![Method::GET, Method::POST]
        );
        assert_eq!(router.allowed_methods("/todos/9"), vec![Method::GET]);
        assert!(router.allowed_methods("/missing").is_empty());
    }

    #[test]
    fn test_operation_ids() {
        let router = todo_router();
        let ops: Vec<_> = router.operation_ids().collect();
        assert_eq!(ops, ["index", "listTodos", "createTodo", "getTodo"]);
        assert!(router.has_operation("getTodo"));
        assert!(!router.has_operation("deleteTodo"));
    }
}
