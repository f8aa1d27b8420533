//! Route table for Mochi.
//!
//! Handler types declare their routes through [`Routes`]; registration
//! compiles each template into a [`RoutePattern`] and binds every declared
//! HTTP method to an [`ActionDescriptor`] in the [`RouteTable`].
//!
//! # Matching
//!
//! - Templates use `{name}` for a dynamic segment matching one or more
//!   non-slash characters; all other characters match literally.
//! - Matching is anchored: the whole path must match.
//! - Patterns are tried in registration order. The first pattern that
//!   matches the path and answers the method wins.
//! - A path that matches only under other methods yields
//!   [`RouteLookup::MethodNotAllowed`]; no match at all yields
//!   [`RouteLookup::NotFound`].
//!
//! # Example
//!
//! ```rust
//! use mochi_router::{HandlerMetadata, RouteDecl, RouteLookup, RouteTable, Routes};
//! use http::Method;
//!
//! struct PostController;
//!
//! impl Routes for PostController {
//!     fn routes() -> HandlerMetadata {
//!         HandlerMetadata::new()
//!             .prefix("/posts")
//!             .route(RouteDecl::get("index", ""))
//!             .route(RouteDecl::post("store", "").middleware(["json"]))
//!             .route(RouteDecl::get("show", "/{slug}"))
//!     }
//! }
//!
//! let mut table = RouteTable::new();
//! table.register::<PostController>().unwrap();
//!
//! let RouteLookup::Found(found) = table.lookup(&Method::GET, "/posts/hello-world") else {
//!     panic!("route should match");
//! };
//! assert_eq!(found.params.get("slug"), Some("hello-world"));
//! ```

#![doc(html_root_url = "https://docs.rs/mochi-router/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod metadata;
mod pattern;
mod table;

pub use metadata::{HandlerMetadata, RouteDecl, Routes, DEFAULT_METHOD};
pub use pattern::RoutePattern;
pub use table::{ActionDescriptor, RouteLookup, RouteMatch, RouteTable};
