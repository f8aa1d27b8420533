//! Request id propagation and access logging.
//!
//! Every request gets an `x-request-id`. When the incoming header is trusted
//! and present it is reused; otherwise a fresh UUID v7 is generated and
//! attached to the request forwarded down the chain. The id is always
//! echoed on the response.

use crate::middleware::{Middleware, Next};
use http::header::{HeaderName, HeaderValue};
use mochi_core::di::{Arguments, Injectable, Parameter};
use mochi_core::{Request, ResolutionError, Response};
use std::time::Instant;
use uuid::Uuid;

/// The header carrying the request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Logs each request and assigns it an id.
#[derive(Debug, Clone, Default)]
pub struct RequestLogMiddleware {
    trust_incoming_ids: bool,
}

impl RequestLogMiddleware {
    /// Creates the middleware; incoming ids are replaced.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the middleware reusing incoming `x-request-id` values.
    #[must_use]
    pub const fn trusting_incoming_ids() -> Self {
        Self {
            trust_incoming_ids: true,
        }
    }

    fn incoming_id<'r>(&self, request: &'r Request) -> Option<&'r str> {
        if !self.trust_incoming_ids {
            return None;
        }
        request
            .header(REQUEST_ID_HEADER)
            .filter(|id| !id.is_empty() && id.len() <= 128)
    }
}

impl Injectable for RequestLogMiddleware {
    fn parameters() -> Vec<Parameter> {
        vec![Parameter::value_or("trust_incoming_ids", false)]
    }

    fn construct(args: &Arguments<'_>) -> Result<Self, ResolutionError> {
        Ok(Self {
            trust_incoming_ids: args.value("trust_incoming_ids")?,
        })
    }
}

impl Middleware for RequestLogMiddleware {
    fn name(&self) -> &'static str {
        "request_log"
    }

    fn handle(&self, request: &Request, next: Next<'_>) -> Response {
        let start = Instant::now();
        let header = HeaderName::from_static(REQUEST_ID_HEADER);

        let (request_id, response) = match self.incoming_id(request) {
            Some(id) => {
                let id = id.to_string();
                let span = tracing::info_span!("request", request_id = %id);
                let _guard = span.enter();
                (id, next.run(request))
            }
            None => {
                let id = Uuid::now_v7().to_string();
                let mut annotated = request.clone();
                if let Ok(value) = HeaderValue::from_str(&id) {
                    annotated.headers_mut().insert(header.clone(), value);
                }
                let span = tracing::info_span!("request", request_id = %id);
                let _guard = span.enter();
                (id, next.run(&annotated))
            }
        };

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        let status = response.status().as_u16();
        if status >= 500 {
            tracing::warn!(
                request_id = %request_id,
                http.method = %request.method(),
                http.path = request.path(),
                http.status_code = status,
                duration_ms,
                "request failed"
            );
        } else {
            tracing::info!(
                request_id = %request_id,
                http.method = %request.method(),
                http.path = request.path(),
                http.status_code = status,
                duration_ms,
                "request completed"
            );
        }

        let mut response = response;
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.insert_header(header, value);
        }
        response
    }
}
