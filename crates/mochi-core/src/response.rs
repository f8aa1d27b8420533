//! The response value built by handlers and middleware.

use crate::error::MochiError;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, ALLOW, CONTENT_TYPE};
use http::{HeaderMap, Method, StatusCode};
use serde::Serialize;

/// Response body payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Body {
    /// No body.
    #[default]
    Empty,
    /// Text or markup.
    Text(String),
    /// A JSON document, serialized when the response is written.
    Json(serde_json::Value),
}

impl Body {
    /// Returns `true` for [`Body::Empty`] and empty text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(text) => text.is_empty(),
            Self::Json(_) => false,
        }
    }

    /// Serializes the payload.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Self::Empty => Bytes::new(),
            Self::Text(text) => Bytes::from(text.clone()),
            Self::Json(value) => Bytes::from(value.to_string()),
        }
    }

    const fn default_content_type(&self) -> Option<&'static str> {
        match self {
            Self::Empty => None,
            Self::Text(_) => Some("text/html; charset=utf-8"),
            Self::Json(_) => Some("application/json"),
        }
    }
}

/// An outgoing response.
///
/// Every dispatch starts from [`Response::new`]: `200 OK`, no headers and an
/// empty body. Handlers mutate it or replace it.
///
/// # Example
///
/// ```rust
/// use mochi_core::Response;
/// use http::StatusCode;
///
/// let response = Response::json(StatusCode::CREATED, &serde_json::json!({"id": 7}));
/// assert_eq!(response.status(), StatusCode::CREATED);
/// assert_eq!(response.content_type(), Some("application/json"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Body,
    absent: bool,
}

impl Response {
    /// Creates an empty `200 OK` response.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a response with the given status and an empty body.
    #[must_use]
    pub fn with_status(status: StatusCode) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Creates the empty `200 OK` that stands in for an operation which
    /// produced no response of its own.
    ///
    /// The marker survives until the status or body is replaced.
    #[must_use]
    pub fn absent() -> Self {
        Self {
            absent: true,
            ..Self::default()
        }
    }

    /// Returns `true` if this is still the untouched [`Response::absent`].
    #[must_use]
    pub fn is_absent(&self) -> bool {
        self.absent
    }

    /// Creates a text/HTML response.
    pub fn text(status: StatusCode, content: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Body::Text(content.into()),
            absent: false,
        }
    }

    /// Creates a JSON response.
    ///
    /// Values that fail to serialize produce `null`.
    pub fn json<T: Serialize + ?Sized>(status: StatusCode, data: &T) -> Self {
        let value = serde_json::to_value(data).unwrap_or(serde_json::Value::Null);
        Self {
            status,
            headers: HeaderMap::new(),
            body: Body::Json(value),
            absent: false,
        }
    }

    /// The fallback for paths that match no route.
    #[must_use]
    pub fn not_found() -> Self {
        Self::text(StatusCode::NOT_FOUND, "<h1>404 Not Found</h1>")
    }

    /// The fallback for paths that match a route under other methods.
    #[must_use]
    pub fn method_not_allowed(allowed: &[Method]) -> Self {
        let mut response = Self::text(
            StatusCode::METHOD_NOT_ALLOWED,
            "<h1>405 Method Not Allowed</h1>",
        );
        let allow = allowed
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        if let Ok(value) = HeaderValue::from_str(&allow) {
            response.headers.insert(ALLOW, value);
        }
        response
    }

    /// The fallback for requests whose handler could not be constructed.
    #[must_use]
    pub fn server_error() -> Self {
        Self::text(
            StatusCode::INTERNAL_SERVER_ERROR,
            "<h1>500 Internal Server Error</h1>",
        )
    }

    /// Renders a handler error as a JSON error envelope.
    #[must_use]
    pub fn from_error(error: &MochiError, request_id: Option<&str>) -> Self {
        Self::json(error.status_code(), &error.to_envelope(request_id))
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Sets the status code.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
        self.absent = false;
    }

    /// Returns the headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the headers for modification.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Returns a header value as a string.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Sets a header, replacing any existing value.
    pub fn insert_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    /// Sets a header, consuming and returning the response.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.insert_header(name, value);
        self
    }

    /// Returns the body.
    #[must_use]
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Replaces the body.
    pub fn set_body(&mut self, body: Body) {
        self.body = body;
        self.absent = false;
    }

    /// Returns `true` if the body is JSON.
    #[must_use]
    pub fn is_json(&self) -> bool {
        matches!(self.body, Body::Json(_))
    }

    /// Returns the explicit content type, or the one implied by the body.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE.as_str())
            .or_else(|| self.body.default_content_type())
    }

    /// Converts into an `http::Response` with a buffered body.
    ///
    /// A content type implied by the body is added unless one was set.
    pub fn into_http(self) -> http::Response<Bytes> {
        let bytes = self.body.to_bytes();
        let mut headers = self.headers;
        if !headers.contains_key(CONTENT_TYPE) {
            if let Some(ct) = self.body.default_content_type() {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(ct));
            }
        }

        let mut response = http::Response::new(bytes);
        *response.status_mut() = self.status;
        *response.headers_mut() = headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_response() {
        let response = Response::new();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.body().is_empty());
        assert!(response.headers().is_empty());
        assert_eq!(response.content_type(), None);
        assert!(!response.is_absent());
    }

    #[test]
    fn test_absent_marker_cleared_by_mutation() {
        let response = Response::absent();
        assert!(response.is_absent());
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.body().is_empty());

        let mut headed = Response::absent();
        headed.insert_header(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        assert!(headed.is_absent());

        let mut bodied = Response::absent();
        bodied.set_body(Body::Text(String::new()));
        assert!(!bodied.is_absent());

        let mut statused = Response::absent();
        statused.set_status(StatusCode::OK);
        assert!(!statused.is_absent());
    }

    #[test]
    fn test_json_response() {
        let response = Response::json(StatusCode::OK, &json!({"ok": true}));
        assert!(response.is_json());
        assert_eq!(response.body().to_bytes().as_ref(), br#"{"ok":true}"#);
    }

    #[test]
    fn test_not_found_fallback() {
        let response = Response::not_found();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.body(), &Body::Text("<h1>404 Not Found</h1>".to_string()));
    }

    #[test]
    fn test_method_not_allowed_sets_allow() {
        let response = Response::method_not_allowed(&[Method::GET, Method::HEAD]);
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.header("allow"), Some("GET, HEAD"));
    }

    #[test]
    fn test_from_error() {
        let error = MochiError::not_found("no such user");
        let response = Response::from_error(&error, Some("req-1"));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        match response.body() {
            Body::Json(value) => {
                assert_eq!(value["error"]["code"], "NOT_FOUND");
                assert_eq!(value["request_id"], "req-1");
            }
            other => panic!("expected JSON body, got {other:?}"),
        }
    }

    #[test]
    fn test_into_http_sets_content_type() {
        let response = Response::text(StatusCode::ACCEPTED, "queued");
        let http = response.into_http();
        assert_eq!(http.status(), StatusCode::ACCEPTED);
        assert_eq!(
            http.headers().get(CONTENT_TYPE).unwrap(),
            "text/html; charset=utf-8"
        );
        assert_eq!(http.body().as_ref(), b"queued");
    }

    #[test]
    fn test_into_http_keeps_explicit_content_type() {
        let response = Response::text(StatusCode::OK, "plain")
            .with_header(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        let http = response.into_http();
        assert_eq!(http.headers().get(CONTENT_TYPE).unwrap(), "text/plain");
    }
}
