//! # Mochi
//!
//! **Route-declared HTTP dispatch with constructor dependency resolution**
//!
//! Handlers declare their routes as data, the route table compiles them
//! into ordered regex patterns, and every request goes through:
//!
//! ```text
//! Request → global middleware → route lookup → route middleware → Handler
//!                                                                    ↓
//! Response ←──────────────── (each middleware post-processes) ←─────┘
//! ```
//!
//! Handlers, services and middleware are built by a [`Resolver`](core::Resolver)
//! that reads declared constructor parameters, resolves dependencies
//! recursively, detects cycles and caches one instance per type.
//!
//! ## Quick Start
//!
//! ```rust
//! use mochi::prelude::*;
//! use http::StatusCode;
//!
//! struct Users;
//!
//! impl Injectable for Users {
//!     fn construct(_args: &Arguments<'_>) -> Result<Self, ResolutionError> {
//!         Ok(Self)
//!     }
//! }
//!
//! impl Routes for Users {
//!     fn routes() -> HandlerMetadata {
//!         HandlerMetadata::new().route(RouteDecl::get("show", "/users/{id}"))
//!     }
//! }
//!
//! impl Handler for Users {
//!     fn call(&self, _: &str, _: &Request, _: Response, params: &PathParams) -> HandlerResult {
//!         let id = params.require("id")?;
//!         Ok(Some(Response::json(StatusCode::OK, &serde_json::json!({ "id": id }))))
//!     }
//! }
//!
//! let kernel = Kernel::builder().handler::<Users>()?.build()?;
//! let response = kernel.handle(&Request::new(http::Method::GET, "/users/42"));
//! assert_eq!(response.status(), StatusCode::OK);
//! # Ok::<(), RegistrationError>(())
//! ```
//!
//! To serve over HTTP, hand the kernel to a [`Server`](server::Server)
//! configured through [`ConfigLoader`](config::ConfigLoader).

#![doc(html_root_url = "https://docs.rs/mochi/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub use mochi_config as config;
pub use mochi_core as core;
pub use mochi_middleware as middleware;
pub use mochi_router as router;
pub use mochi_server as server;
pub use mochi_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use mochi::prelude::*;
/// ```
pub mod prelude {
    pub use mochi_core::di::{Arguments, Injectable, Parameter};
    pub use mochi_core::renderer::Renderer;
    pub use mochi_core::validator::{Rule, Rules};
    pub use mochi_core::{
        Handler, HandlerResult, MochiError, MochiResult, PathParams, RegistrationError, Request,
        ResolutionError, Resolver, Response,
    };

    pub use mochi_middleware::{FnMiddleware, Middleware, Next};
    pub use mochi_router::{HandlerMetadata, RouteDecl, Routes};
    pub use mochi_server::{Kernel, KernelBuilder, Server};

    pub use mochi_config::{ConfigLoader, MochiConfig};
    pub use mochi_telemetry::init_logging;
}
