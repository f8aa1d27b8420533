//! Testing utilities for Mochi applications.
//!
//! [`TestClient`] drives a [`Kernel`](mochi_server::Kernel) in memory: no
//! socket, no runtime. Requests go through global middleware, routing,
//! route middleware and the handler exactly as they would behind the
//! transport.
//!
//! # Example
//!
//! ```rust
//! use mochi_server::Kernel;
//! use mochi_test::TestClient;
//! use http::StatusCode;
//!
//! let client = TestClient::new(Kernel::builder().build().unwrap());
//!
//! client
//!     .get("/missing")
//!     .send()
//!     .assert_status(StatusCode::NOT_FOUND)
//!     .assert_body_contains("404");
//! ```

#![doc(html_root_url = "https://docs.rs/mochi-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod response;

pub use client::{TestClient, TestClientRequest};
pub use error::TestError;
pub use response::TestResponse;
