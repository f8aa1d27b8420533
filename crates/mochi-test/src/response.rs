//! Captured responses and assertions.

use crate::error::TestError;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, StatusCode};
use mochi_core::Response;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A response captured by the [`TestClient`](crate::TestClient).
///
/// Headers are those written to the wire, so a content type implied by the
/// body is present even when the handler never set one.
///
/// Assertion methods panic with the body in the message and return `&Self`
/// so they chain:
///
/// ```rust,ignore
/// client
///     .get("/users/42")
///     .send()
///     .assert_status(StatusCode::OK)
///     .assert_json_field("id", &json!("42"));
/// ```
#[derive(Debug, Clone)]
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    /// Captures a dispatched response.
    #[must_use]
    pub fn from_response(response: Response) -> Self {
        let (parts, body) = response.into_http().into_parts();
        Self {
            status: parts.status,
            headers: parts.headers,
            body,
        }
    }

    /// Returns the status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the status as a number.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Returns `true` for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns `true` for 4xx statuses.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status.is_client_error()
    }

    /// Returns `true` for 5xx statuses.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status.is_server_error()
    }

    /// Returns all headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a header as a string.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the content type.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE.as_str())
    }

    /// Returns the raw body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body as UTF-8 text.
    pub fn text(&self) -> Result<String, TestError> {
        Ok(String::from_utf8(self.body.to_vec())?)
    }

    /// Deserializes the JSON body.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TestError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Parses the body as an untyped JSON value.
    pub fn json_value(&self) -> Result<Value, TestError> {
        self.json()
    }

    fn body_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Asserts the status.
    ///
    /// # Panics
    ///
    /// Panics if the status differs.
    #[track_caller]
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "unexpected status; body: {}",
            self.body_lossy()
        );
        self
    }

    /// Asserts the numeric status.
    ///
    /// # Panics
    ///
    /// Panics if the status differs.
    #[track_caller]
    pub fn assert_status_code(&self, expected: u16) -> &Self {
        assert_eq!(
            self.status.as_u16(),
            expected,
            "unexpected status; body: {}",
            self.body_lossy()
        );
        self
    }

    /// Asserts a 2xx status.
    ///
    /// # Panics
    ///
    /// Panics on any other status.
    #[track_caller]
    pub fn assert_success(&self) -> &Self {
        assert!(
            self.is_success(),
            "expected success, got {}; body: {}",
            self.status,
            self.body_lossy()
        );
        self
    }

    /// Asserts a header value.
    ///
    /// # Panics
    ///
    /// Panics if the header is missing or differs.
    #[track_caller]
    pub fn assert_header(&self, name: &str, expected: &str) -> &Self {
        match self.header(name) {
            Some(actual) => assert_eq!(actual, expected, "header `{name}` differs"),
            None => panic!("header `{name}` is missing"),
        }
        self
    }

    /// Asserts that the content type starts with `expected`.
    ///
    /// # Panics
    ///
    /// Panics if the content type is missing or does not match.
    #[track_caller]
    pub fn assert_content_type(&self, expected: &str) -> &Self {
        let actual = self.content_type().unwrap_or_default();
        assert!(
            actual.starts_with(expected),
            "expected content type `{expected}`, got `{actual}`"
        );
        self
    }

    /// Asserts that the body contains `needle`.
    ///
    /// # Panics
    ///
    /// Panics if it does not.
    #[track_caller]
    pub fn assert_body_contains(&self, needle: &str) -> &Self {
        let body = self.body_lossy();
        assert!(body.contains(needle), "`{needle}` not found in body: {body}");
        self
    }

    /// Asserts the exact body text.
    ///
    /// # Panics
    ///
    /// Panics if the body differs.
    #[track_caller]
    pub fn assert_body_eq(&self, expected: &str) -> &Self {
        assert_eq!(self.body_lossy(), expected);
        self
    }

    /// Asserts the whole JSON body.
    ///
    /// # Panics
    ///
    /// Panics if the body is not JSON or differs.
    #[track_caller]
    pub fn assert_json_eq(&self, expected: &Value) -> &Self {
        let actual = self.json_value().unwrap_or_else(|e| {
            panic!("body is not JSON ({e}): {}", self.body_lossy())
        });
        assert_eq!(&actual, expected);
        self
    }

    /// Asserts one JSON field, addressed by a dotted path such as
    /// `error.details.0.field`.
    ///
    /// # Panics
    ///
    /// Panics if the body is not JSON or the field is missing or differs.
    #[track_caller]
    pub fn assert_json_field(&self, path: &str, expected: &Value) -> &Self {
        let actual = self.json_value().unwrap_or_else(|e| {
            panic!("body is not JSON ({e}): {}", self.body_lossy())
        });
        match actual.pointer(&dotted_to_pointer(path)) {
            Some(value) => assert_eq!(value, expected, "field `{path}` differs"),
            None => panic!("field `{path}` missing in {actual}"),
        }
        self
    }
}

fn dotted_to_pointer(path: &str) -> String {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .fold(String::new(), |mut pointer, segment| {
            pointer.push('/');
            pointer.push_str(segment);
            pointer
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::HeaderValue;
    use serde_json::json;

    fn captured() -> TestResponse {
        let response = Response::json(
            StatusCode::CREATED,
            &json!({"user": {"id": 7, "roles": ["admin", "ops"]}}),
        )
        .with_header(
            http::header::HeaderName::from_static("x-trace"),
            HeaderValue::from_static("t-1"),
        );
        TestResponse::from_response(response)
    }

    #[test]
    fn test_capture_adds_implied_content_type() {
        let response = captured();
        assert_eq!(response.status_code(), 201);
        assert!(response.is_success());
        assert!(!response.is_client_error());
        assert_eq!(response.content_type(), Some("application/json"));
        assert_eq!(response.header("x-trace"), Some("t-1"));
    }

    #[test]
    fn test_json_accessors() {
        let response = captured();
        let value = response.json_value().unwrap();
        assert_eq!(value["user"]["id"], 7);
        response
            .assert_json_field("user.roles.1", &json!("ops"))
            .assert_header("x-trace", "t-1")
            .assert_body_contains("admin");
    }

    #[test]
    fn test_text_body() {
        let response = TestResponse::from_response(Response::text(StatusCode::OK, "hello"));
        assert_eq!(response.text().unwrap(), "hello");
        response
            .assert_body_eq("hello")
            .assert_content_type("text/html");
        assert!(response.json_value().is_err());
    }

    #[test]
    #[should_panic(expected = "field `user.name` missing")]
    fn test_missing_field_panics() {
        captured().assert_json_field("user.name", &json!("Ada"));
    }

    #[test]
    fn test_dotted_to_pointer() {
        assert_eq!(dotted_to_pointer("a.b.0"), "/a/b/0");
        assert_eq!(dotted_to_pointer(""), "");
    }
}
