//! Response builders shared by the server and its handlers.
//!
//! Error responses use a plain-text body terminated by a newline, served
//! with `X-Content-Type-Options: nosniff`.

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS};
use http::{Response, StatusCode};
use http_body_util::Full;
use serde::Serialize;

/// Type alias for HTTP response body.
pub type ResponseBody = Full<Bytes>;

/// Type alias for the HTTP response.
pub type HttpResponse = Response<ResponseBody>;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const APPLICATION_JSON: &str = "application/json";

/// Builds a `text/plain` response.
pub fn text(status: StatusCode, body: impl Into<Bytes>) -> HttpResponse {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));
    response
}

/// Builds a plain-text error response carrying `message`.
pub fn error(status: StatusCode, message: impl AsRef<str>) -> HttpResponse {
    let mut response = text(status, format!("{}\n", message.as_ref()));
    response
        .headers_mut()
        .insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    response
}

/// Serializes `value` as a `200 OK` JSON response.
///
/// If encoding fails the status stays `200`: the body becomes a plain-text
/// diagnostic instead and the failure is logged.
pub fn json<T: Serialize + ?Sized>(value: &T) -> HttpResponse {
    match serde_json::to_vec(value) {
        Ok(body) => {
            let mut response = Response::new(Full::new(Bytes::from(body)));
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
            response
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode response");
            text(StatusCode::OK, format!("Failed to encode response: {e}"))
        }
    }
}

/// `404` response for paths no route knows.
pub fn not_found() -> HttpResponse {
    error(StatusCode::NOT_FOUND, "404 page not found")
}

/// `405` response listing the methods the path does support.
pub fn method_not_allowed(allowed: &[http::Method]) -> HttpResponse {
    let mut response = error(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
    let allow = allowed
        .iter()
        .map(http::Method::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if let Ok(value) = HeaderValue::from_str(&allow) {
        response.headers_mut().insert(http::header::ALLOW, value);
    }
    response
}
