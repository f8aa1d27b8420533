//! Chain construction.

use crate::middleware::{Middleware, Next};
use mochi_core::{Request, Response};
use std::sync::Arc;

/// Builds a continuation that runs `middleware` in order around `terminal`.
///
/// The list is walked in reverse so that each middleware wraps the
/// continuation built so far; the head of the returned chain is therefore the
/// first middleware in the list. An empty list yields the terminal itself.
///
/// # Example
///
/// ```rust
/// use mochi_middleware::{build_chain, FnMiddleware, Middleware, Next};
/// use mochi_core::{Request, Response};
/// use http::{Method, StatusCode};
/// use std::sync::Arc;
///
/// let teapot: Arc<dyn Middleware> = Arc::new(FnMiddleware::new("teapot", |req: &Request, next: Next<'_>| {
///     let mut response = next.run(req);
///     response.set_status(StatusCode::IM_A_TEAPOT);
///     response
/// }));
/// let stack = vec![teapot];
///
/// let head = build_chain(&stack, |_req: &Request| Response::new());
/// let response = head.run(&Request::new(Method::GET, "/"));
/// assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
/// ```
pub fn build_chain<'a, F>(middleware: &'a [Arc<dyn Middleware>], terminal: F) -> Next<'a>
where
    F: FnOnce(&Request) -> Response + 'a,
{
    middleware
        .iter()
        .rev()
        .fold(Next::terminal(terminal), |next, m| Next::new(m.as_ref(), next))
}
