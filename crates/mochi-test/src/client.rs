//! In-memory client.

use crate::error::TestError;
use crate::response::TestResponse;
use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::Method;
use mochi_core::{Request, RequestBuilder};
use mochi_server::Kernel;
use std::sync::Arc;

/// Sends requests straight into a kernel.
#[must_use]
#[derive(Debug, Clone)]
pub struct TestClient {
    kernel: Arc<Kernel>,
    default_headers: Vec<(String, String)>,
}

impl TestClient {
    /// Creates a client for `kernel`.
    pub fn new(kernel: impl Into<Arc<Kernel>>) -> Self {
        Self {
            kernel: kernel.into(),
            default_headers: Vec::new(),
        }
    }

    /// Adds a header sent with every request.
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Returns the kernel.
    #[must_use]
    pub fn kernel(&self) -> &Arc<Kernel> {
        &self.kernel
    }

    /// Starts a GET request.
    pub fn get(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::GET, uri)
    }

    /// Starts a POST request.
    pub fn post(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::POST, uri)
    }

    /// Starts a PUT request.
    pub fn put(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::PUT, uri)
    }

    /// Starts a PATCH request.
    pub fn patch(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::PATCH, uri)
    }

    /// Starts a DELETE request.
    pub fn delete(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::DELETE, uri)
    }

    /// Starts a request with any method.
    pub fn request(&self, method: Method, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        let mut builder = Request::builder().method(method).uri(uri.as_ref());
        for (name, value) in &self.default_headers {
            builder = builder.header(name, value);
        }
        TestClientRequest {
            client: self,
            builder,
        }
    }

    fn execute(&self, request: &Request) -> TestResponse {
        TestResponse::from_response(self.kernel.handle(request))
    }
}

/// A request being built for a [`TestClient`].
#[derive(Debug)]
#[must_use]
pub struct TestClientRequest<'a> {
    client: &'a TestClient,
    builder: RequestBuilder,
}

impl TestClientRequest<'_> {
    /// Adds a header.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.builder = self.builder.header(name.as_ref(), value.as_ref());
        self
    }

    /// Sets the content type.
    pub fn content_type(self, content_type: impl AsRef<str>) -> Self {
        self.header(CONTENT_TYPE.as_str(), content_type)
    }

    /// Sets a bearer token.
    pub fn bearer_token(self, token: impl AsRef<str>) -> Self {
        let value = format!("Bearer {}", token.as_ref());
        self.header(AUTHORIZATION.as_str(), value)
    }

    /// Sets the raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.builder = self.builder.body(body);
        self
    }

    /// Sets a JSON body and content type.
    pub fn json<T: serde::Serialize + ?Sized>(mut self, value: &T) -> Self {
        self.builder = self.builder.json(value);
        self
    }

    /// Sets a url-encoded form body and content type.
    pub fn form<T: serde::Serialize + ?Sized>(mut self, value: &T) -> Self {
        self.builder = self.builder.form(value);
        self
    }

    /// Sends the request.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built, for example with an invalid URI.
    pub fn send(self) -> TestResponse {
        self.try_send().expect("valid test request")
    }

    /// Sends the request, reporting build failures.
    pub fn try_send(self) -> Result<TestResponse, TestError> {
        let request = self.builder.build()?;
        Ok(self.client.execute(&request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use mochi_core::di::{Arguments, Injectable};
    use mochi_core::{Handler, HandlerResult, PathParams, ResolutionError, Response};
    use mochi_router::{HandlerMetadata, RouteDecl, Routes};
    use serde_json::json;

    struct Echo;

    impl Injectable for Echo {
        fn construct(_args: &Arguments<'_>) -> Result<Self, ResolutionError> {
            Ok(Self)
        }
    }

    impl Routes for Echo {
        fn routes() -> HandlerMetadata {
            HandlerMetadata::new()
                .route(RouteDecl::new("echo", "/echo").methods(["GET", "POST", "PUT"]))
        }
    }

    impl Handler for Echo {
        fn call(&self, _: &str, request: &Request, _: Response, _: &PathParams) -> HandlerResult {
            Ok(Some(Response::json(
                StatusCode::OK,
                &json!({
                    "method": request.method().as_str(),
                    "auth": request.header("authorization"),
                    "tenant": request.header("x-tenant"),
                    "data": request.all(),
                }),
            )))
        }
    }

    fn client() -> TestClient {
        let kernel = Kernel::builder().handler::<Echo>().unwrap().build().unwrap();
        TestClient::new(kernel)
    }

    #[test]
    fn test_json_request() {
        let response = client().post("/echo").json(&json!({"a": 1})).send();
        response
            .assert_status(StatusCode::OK)
            .assert_content_type("application/json")
            .assert_json_field("method", &json!("POST"))
            .assert_json_field("data.a", &json!(1));
    }

    #[test]
    fn test_form_and_query_data() {
        let response = client().put("/echo?page=2").form(&[("q", "tea")]).send();
        response
            .assert_json_field("data.page", &json!("2"))
            .assert_json_field("data.q", &json!("tea"));
    }

    #[test]
    fn test_headers_and_defaults() {
        let client = client().with_default_header("x-tenant", "acme");
        client
            .get("/echo")
            .bearer_token("secret")
            .send()
            .assert_json_field("auth", &json!("Bearer secret"))
            .assert_json_field("tenant", &json!("acme"));
    }

    #[test]
    fn test_invalid_uri_is_reported() {
        let result = client().get("not a uri").try_send();
        assert!(matches!(result, Err(TestError::RequestBuild(_))));
    }
}
