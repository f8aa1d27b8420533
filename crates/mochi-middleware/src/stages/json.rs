//! JSON content enforcement.

use crate::middleware::{Middleware, Next};
use http::StatusCode;
use mochi_core::di::{Arguments, Injectable};
use mochi_core::{Body, Request, ResolutionError, Response};
use serde_json::json;

/// Middleware for JSON-only endpoints.
///
/// - Requests whose content type is not JSON are answered with a 400 JSON
///   error and never reach the handler.
/// - When the operation produced no response ([`Response::is_absent`]), the
///   default is replaced by a JSON acknowledgement. A handler that returns
///   an empty `200 OK` on purpose keeps it.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMiddleware;

impl JsonMiddleware {
    /// Creates the middleware.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Injectable for JsonMiddleware {
    fn construct(_args: &Arguments<'_>) -> Result<Self, ResolutionError> {
        Ok(Self)
    }
}

impl Middleware for JsonMiddleware {
    fn name(&self) -> &'static str {
        "json"
    }

    fn handle(&self, request: &Request, next: Next<'_>) -> Response {
        if !request.is_json() {
            tracing::debug!(
                content_type = request.header("content-type").unwrap_or(""),
                "rejecting non-JSON request"
            );
            return Response::json(
                StatusCode::BAD_REQUEST,
                &json!({"error": "Invalid Content-Type, expected application/json"}),
            );
        }

        let mut response = next.run(request);
        if response.is_absent() {
            response.set_body(Body::Json(json!({"message": "Request successfully processed"})));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    fn json_request() -> Request {
        Request::builder()
            .method(Method::POST)
            .uri("/items")
            .json(&json!({"name": "tea"}))
            .build()
            .unwrap()
    }

    #[test]
    fn test_rejects_non_json() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/items")
            .form(&[("name", "tea")])
            .build()
            .unwrap();

        let reached = std::cell::Cell::new(false);
        let response = JsonMiddleware.handle(
            &request,
            Next::terminal(|_: &Request| {
                reached.set(true);
                Response::new()
            }),
        );

        assert!(!reached.get());
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.body(),
            &Body::Json(json!({"error": "Invalid Content-Type, expected application/json"}))
        );
    }

    #[test]
    fn test_acknowledges_absent_response() {
        let response = JsonMiddleware.handle(&json_request(), Next::terminal(|_: &Request| Response::absent()));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.body(),
            &Body::Json(json!({"message": "Request successfully processed"}))
        );
    }

    #[test]
    fn test_explicit_empty_ok_is_untouched() {
        let response = JsonMiddleware.handle(&json_request(), Next::terminal(|_: &Request| Response::new()));
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.body().is_empty());
    }

    #[test]
    fn test_keeps_handler_body() {
        let response = JsonMiddleware.handle(
            &json_request(),
            Next::terminal(|_: &Request| Response::json(StatusCode::CREATED, &json!({"id": 1}))),
        );
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.body(), &Body::Json(json!({"id": 1})));
    }

    #[test]
    fn test_empty_non_ok_is_untouched() {
        let response = JsonMiddleware.handle(
            &json_request(),
            Next::terminal(|_: &Request| {
                let mut response = Response::absent();
                response.set_status(StatusCode::NO_CONTENT);
                response
            }),
        );
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.body().is_empty());
    }
}
