//! The request value seen by middleware and handlers.

use crate::error::MochiError;
use crate::validator::{Rules, Validator};
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, Method};
use serde_json::{Map, Value};

/// An incoming request with its body already read and its data parsed.
///
/// The data payload is:
///
/// - the decoded JSON body when the content type is JSON (an unreadable body
///   yields an empty object);
/// - otherwise the query string merged with a url-encoded form body, where
///   form fields win over query fields of the same name.
///
/// # Example
///
/// ```rust
/// use mochi_core::Request;
/// use http::Method;
///
/// let request = Request::builder()
///     .method(Method::POST)
///     .uri("/users?source=web")
///     .json(&serde_json::json!({"name": "Ada"}))
///     .build()
///     .unwrap();
///
/// assert_eq!(request.path(), "/users");
/// assert_eq!(request.query(), Some("source=web"));
/// assert_eq!(request.input_str("name"), Some("Ada"));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
    data: Value,
}

impl Request {
    /// Creates a body-less request.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            data: Value::Object(Map::new()),
        }
    }

    /// Returns a builder for requests.
    #[must_use]
    pub fn builder() -> RequestBuilder {
        RequestBuilder::new()
    }

    /// Builds a request from `http` parts and a fully read body.
    pub fn from_parts(parts: http::request::Parts, body: Bytes) -> Self {
        let path = parts.uri.path().to_string();
        let query = parts.uri.query().map(ToString::to_string);
        let data = parse_data(&parts.headers, query.as_deref(), &body);

        Self {
            method: parts.method,
            path,
            query,
            headers: parts.headers,
            body,
            data,
        }
    }

    /// Builds a request from an `http::Request` with a buffered body.
    pub fn from_http(request: http::Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();
        Self::from_parts(parts, body)
    }

    /// Returns the HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request path without the query string.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the raw query string.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Returns all headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the headers for modification.
    ///
    /// Middleware that annotates a request (for example with a request id)
    /// clones it, edits the copy and forwards the copy.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Returns a header value by case-insensitive name.
    ///
    /// Values that are not visible ASCII are treated as absent.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the raw body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns `true` if the content type is JSON.
    #[must_use]
    pub fn is_json(&self) -> bool {
        is_json_content(&self.headers)
    }

    /// Returns the whole data payload.
    #[must_use]
    pub fn all(&self) -> &Value {
        &self.data
    }

    /// Returns one field of the data payload.
    #[must_use]
    pub fn input(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Returns one field of the data payload, or `default` when absent.
    #[must_use]
    pub fn input_or<'a>(&'a self, key: &str, default: &'a Value) -> &'a Value {
        self.input(key).unwrap_or(default)
    }

    /// Returns a string field of the data payload.
    #[must_use]
    pub fn input_str(&self, key: &str) -> Option<&str> {
        self.input(key).and_then(Value::as_str)
    }

    /// Returns `true` if the data payload contains `key`.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.input(key).is_some()
    }

    /// Validates the data payload and returns it when every rule passes.
    pub fn validate(&self, rules: &Rules) -> Result<&Value, MochiError> {
        let mut validator = Validator::new();
        if validator.validate(&self.data, rules) {
            Ok(&self.data)
        } else {
            Err(validator.into_error())
        }
    }
}

/// Builder for [`Request`] values, mostly used by tests and adapters.
#[derive(Debug)]
pub struct RequestBuilder {
    inner: http::request::Builder,
    body: Bytes,
}

impl RequestBuilder {
    fn new() -> Self {
        Self {
            inner: http::Request::builder(),
            body: Bytes::new(),
        }
    }

    /// Sets the HTTP method.
    pub fn method(mut self, method: Method) -> Self {
        self.inner = self.inner.method(method);
        self
    }

    /// Sets the target URI (path and optional query).
    pub fn uri(mut self, uri: &str) -> Self {
        self.inner = self.inner.uri(uri);
        self
    }

    /// Appends a header.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.inner = self.inner.header(name, value);
        self
    }

    /// Sets the raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets a JSON body and content type.
    pub fn json<T: serde::Serialize + ?Sized>(self, value: &T) -> Self {
        let body = serde_json::to_vec(value).unwrap_or_default();
        self.header(CONTENT_TYPE.as_str(), "application/json")
            .body(body)
    }

    /// Sets a url-encoded form body and content type.
    pub fn form<T: serde::Serialize + ?Sized>(self, value: &T) -> Self {
        let body = serde_urlencoded::to_string(value).unwrap_or_default();
        self.header(CONTENT_TYPE.as_str(), "application/x-www-form-urlencoded")
            .body(body)
    }

    /// Builds the request.
    pub fn build(self) -> Result<Request, http::Error> {
        let request = self.inner.body(self.body)?;
        Ok(Request::from_http(request))
    }
}

fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
}

fn is_json_content(headers: &HeaderMap) -> bool {
    content_type(headers).is_some_and(|ct| {
        let essence = ct.split(';').next().unwrap_or(ct).trim();
        essence.eq_ignore_ascii_case("application/json") || essence.ends_with("+json")
    })
}

fn is_form_content(headers: &HeaderMap) -> bool {
    content_type(headers).is_some_and(|ct| {
        ct.split(';')
            .next()
            .is_some_and(|essence| {
                essence
                    .trim()
                    .eq_ignore_ascii_case("application/x-www-form-urlencoded")
            })
    })
}

fn parse_data(headers: &HeaderMap, query: Option<&str>, body: &[u8]) -> Value {
    if is_json_content(headers) {
        return match serde_json::from_slice::<Value>(body) {
            Ok(Value::Null) | Err(_) => Value::Object(Map::new()),
            Ok(value) => value,
        };
    }

    let mut data = Map::new();
    if let Some(query) = query {
        merge_form(&mut data, query.as_bytes());
    }
    if is_form_content(headers) {
        merge_form(&mut data, body);
    }
    Value::Object(data)
}

fn merge_form(data: &mut Map<String, Value>, encoded: &[u8]) {
    match serde_urlencoded::from_bytes::<Vec<(String, String)>>(encoded) {
        Ok(pairs) => {
            for (key, value) in pairs {
                data.insert(key, Value::String(value));
            }
        }
        Err(e) => tracing::debug!(error = %e, "ignoring undecodable form data"),
    }
}
