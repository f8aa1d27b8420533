//! Built-in middleware.
//!
//! - [`JsonMiddleware`] enforces a JSON content type and acknowledges empty
//!   successes with a JSON message.
//! - [`RequestLogMiddleware`] assigns a request id and logs every request.

mod json;
mod request_log;

pub use json::JsonMiddleware;
pub use request_log::{RequestLogMiddleware, REQUEST_ID_HEADER};
