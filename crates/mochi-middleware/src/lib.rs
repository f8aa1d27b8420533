//! Middleware for Mochi.
//!
//! Middleware wraps request handling in onion order: the first middleware in
//! a list sees the request first and the response last.
//!
//! ```text
//! request ──► A ──► B ──► handler
//! response ◄── A ◄── B ◄──┘
//! ```
//!
//! - [`Middleware`] is the contract, [`Next`] the continuation.
//! - [`build_chain`] turns a list of middleware and a terminal action into
//!   the head of a chain.
//! - [`MiddlewareRegistry`] maps the identifiers used in route declarations
//!   to instances, resolving types through the shared [`Resolver`] so each
//!   middleware type is constructed once.
//! - [`stages`] holds the built-in middleware.
//!
//! [`Resolver`]: mochi_core::Resolver

#![doc(html_root_url = "https://docs.rs/mochi-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod chain;
mod middleware;
mod registry;
pub mod stages;

pub use chain::build_chain;
pub use middleware::{FnMiddleware, Middleware, Next};
pub use registry::{MiddlewareError, MiddlewareFactory, MiddlewareRegistry};
pub use stages::{JsonMiddleware, RequestLogMiddleware, REQUEST_ID_HEADER};
