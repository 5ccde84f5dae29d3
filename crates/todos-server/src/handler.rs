//! Handler registration and dispatch.
//!
//! Handlers are async functions keyed by operation id. Each one receives
//! the matched path parameters and the collected request body and writes a
//! complete [`HttpResponse`]; decoding, status selection and encoding are
//! the handler's own business.
//!
//! # Example
//!
//! ```rust
//! use todos_server::handler::{HandlerRegistry, HandlerRequest};
//! use todos_server::response;
//! use http::StatusCode;
//!
//! let mut registry = HandlerRegistry::new();
//! registry.register("index", |_req: HandlerRequest| async {
//!     response::text(StatusCode::OK, "Hello, World!")
//! });
//! assert!(registry.contains("index"));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::{self, DeserializeOwned};

use crate::response::HttpResponse;

/// Type alias for a boxed handler future.
pub type BoxedHandlerFuture = Pin<Box<dyn Future<Output = HttpResponse> + Send>>;

/// A type-erased handler function.
pub type ErasedHandler = Arc<dyn Fn(HandlerRequest) -> BoxedHandlerFuture + Send + Sync>;

/// The parts of a request a handler gets to see.
#[derive(Debug, Clone, Default)]
pub struct HandlerRequest {
    params: HashMap<String, String>,
    body: Bytes,
}

impl HandlerRequest {
    /// Creates a request from path parameters and a body.
    #[must_use]
    pub fn new(params: HashMap<String, String>, body: Bytes) -> Self {
        Self { params, body }
    }

    /// Returns a path parameter by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Returns the raw request body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Decodes the first JSON value in the body.
    ///
    /// Anything after that value is left unread. An empty body is an error.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::Deserializer::from_slice(&self.body)
            .into_iter::<T>()
            .next()
            .unwrap_or_else(|| Err(de::Error::custom("EOF")))
    }
}

/// Registry mapping operation ids to handlers.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, ErasedHandler>,
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("operations", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl HandlerRegistry {
    /// Creates a new empty handler registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers a handler for an operation, replacing any previous one.
    pub fn register<F, Fut>(&mut self, operation_id: impl Into<String>, handler: F)
    where
        F: Fn(HandlerRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HttpResponse> + Send + 'static,
    {
        let erased: ErasedHandler = Arc::new(move |req| Box::pin(handler(req)));
        self.handlers.insert(operation_id.into(), erased);
    }

    /// Looks up a handler by operation id.
    #[must_use]
    pub fn get(&self, operation_id: &str) -> Option<&ErasedHandler> {
        self.handlers.get(operation_id)
    }

    /// Checks if a handler is registered for an operation.
    #[must_use]
    pub fn contains(&self, operation_id: &str) -> bool {
        self.handlers.contains_key(operation_id)
    }

    /// Returns the number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Invokes the handler for `operation_id`, if one is registered.
    pub async fn invoke(&self, operation_id: &str, request: HandlerRequest) -> Option<HttpResponse> {
        let handler = Arc::clone(self.handlers.get(operation_id)?);
        Some(handler(request).await)
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;
    use http_body_util::BodyExt;
    use serde::Deserialize;

    use super::*;
    use crate::response;

    #[derive(Debug, Deserialize)]
    struct Echo {
        message: String,
    }

    fn registry() -> HandlerRegistry {
        let mut registry = HandlerRegistry::new();
        registry.register("echo", |req: HandlerRequest| async move {
            match req.json::<Echo>() {
                Ok(echo) => response::text(StatusCode::OK, echo.message),
                Err(e) => response::error(StatusCode::BAD_REQUEST, e.to_string()),
            }
        });
        registry.register("param", |req: HandlerRequest| async move {
            response::text(StatusCode::OK, req.param("id").unwrap_or("none").to_string())
        });
        registry
    }

    #[test]
    fn test_registry_bookkeeping() {
        let registry = registry();
        assert_eq!(registry.len(), 2);
        assert!(!registry.is_empty());
        assert!(registry.contains("echo"));
        assert!(registry.get("missing").is_none());
        assert!(HandlerRegistry::new().is_empty());
    }

    #[tokio::test]
    async fn test_invoke_with_body() {
        let registry = registry();
        let request = HandlerRequest::new(HashMap::new(), Bytes::from(r#"{"message":"hi"}"#));

        let response = registry.invoke("echo", request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"hi");
    }

    #[tokio::test]
    async fn test_invoke_decode_failure_is_handler_decision() {
        let registry = registry();
        let request = HandlerRequest::new(HashMap::new(), Bytes::from("not json"));

        let response = registry.invoke("echo", request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_json_reads_first_value_only() {
        let request = HandlerRequest::new(
            HashMap::new(),
            Bytes::from("{\"message\":\"hi\"} {\"message\":\"ignored\"} trailing"),
        );
        let echo: Echo = request.json().unwrap();
        assert_eq!(echo.message, "hi");
    }

    #[test]
    fn test_json_empty_body() {
        let err = HandlerRequest::default().json::<Echo>().unwrap_err();
        assert_eq!(err.to_string(), "EOF");
    }

    #[tokio::test]
    async fn test_invoke_with_params() {
        let registry = registry();
        let params = [("id".to_string(), "42".to_string())].into_iter().collect();

        let response = registry
            .invoke("param", HandlerRequest::new(params, Bytes::new()))
            .await
            .unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"42");
    }

    #[tokio::test]
    async fn test_invoke_unknown_operation() {
        let registry = registry();
        assert!(registry
            .invoke("missing", HandlerRequest::default())
            .await
            .is_none());
    }
}
