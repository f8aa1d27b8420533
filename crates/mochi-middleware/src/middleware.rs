//! Core middleware trait and continuation type.
//!
//! A middleware receives the request and a [`Next`] continuation. It may
//! inspect the request, call `next.run(..)` to continue the chain, inspect
//! or replace the response that comes back, or return its own response
//! without calling `next` at all (short-circuit).
//!
//! # Example
//!
//! ```rust
//! use mochi_middleware::{Middleware, Next};
//! use mochi_core::{Request, Response};
//! use http::header::{HeaderValue, CACHE_CONTROL};
//!
//! struct NoStore;
//!
//! impl Middleware for NoStore {
//!     fn name(&self) -> &'static str {
//!         "no_store"
//!     }
//!
//!     fn handle(&self, request: &Request, next: Next<'_>) -> Response {
//!         let mut response = next.run(request);
//!         response.insert_header(CACHE_CONTROL, HeaderValue::from_static("no-store"));
//!         response
//!     }
//! }
//! ```

use mochi_core::{Request, Response};

/// The middleware contract.
///
/// # Invariants
///
/// - `next` is consumed by `run`, so it can be invoked at most once.
/// - Returning without calling `next` short-circuits every later middleware
///   and the handler.
pub trait Middleware: Send + Sync + 'static {
    /// Returns a short name used in logs.
    fn name(&self) -> &'static str;

    /// Processes the request, usually by delegating to `next`.
    fn handle(&self, request: &Request, next: Next<'_>) -> Response;
}

/// The rest of the chain.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    Chain {
        middleware: &'a dyn Middleware,
        next: Box<Next<'a>>,
    },
    Terminal(Box<dyn FnOnce(&Request) -> Response + 'a>),
}

impl<'a> Next<'a> {
    /// Wraps `next` with `middleware`.
    pub(crate) fn new(middleware: &'a dyn Middleware, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Chain {
                middleware,
                next: Box::new(next),
            },
        }
    }

    /// Creates the innermost continuation.
    pub fn terminal<F>(f: F) -> Self
    where
        F: FnOnce(&Request) -> Response + 'a,
    {
        Self {
            inner: NextInner::Terminal(Box::new(f)),
        }
    }

    /// Runs the next middleware, or the terminal action at the end of the chain.
    ///
    /// The request passed on does not have to be the one received; a
    /// middleware may forward an annotated copy.
    pub fn run(self, request: &Request) -> Response {
        match self.inner {
            NextInner::Chain { middleware, next } => {
                tracing::trace!(middleware = middleware.name(), "entering middleware");
                middleware.handle(request, *next)
            }
            NextInner::Terminal(terminal) => terminal(request),
        }
    }
}

impl std::fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            NextInner::Chain { middleware, .. } => {
                f.debug_tuple("Next").field(&middleware.name()).finish()
            }
            NextInner::Terminal(_) => f.write_str("Next(<terminal>)"),
        }
    }
}

/// A middleware defined by a closure.
///
/// # Example
///
/// ```rust
/// use mochi_middleware::{FnMiddleware, Next};
/// use mochi_core::{Request, Response};
/// use http::StatusCode;
///
/// let maintenance = FnMiddleware::new("maintenance", |_request: &Request, _next: Next<'_>| {
///     Response::text(StatusCode::SERVICE_UNAVAILABLE, "Back soon")
/// });
/// ```
pub struct FnMiddleware<F> {
    name: &'static str,
    func: F,
}

impl<F> FnMiddleware<F> {
    /// Creates a closure-based middleware.
    pub const fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&Request, Next<'_>) -> Response + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn handle(&self, request: &Request, next: Next<'_>) -> Response {
        (self.func)(request, next)
    }
}
