//! Handler trait.
//!
//! A handler is a long-lived object exposing one or more operations by name.
//! The route table stores only the handler's [`TypeKey`] and the operation
//! name; the dispatcher resolves the instance and calls [`Handler::call`].
//!
//! [`TypeKey`]: crate::di::TypeKey

use crate::di::Resolver;
use crate::error::{MochiError, ResolutionError};
use crate::params::PathParams;
use crate::request::Request;
use crate::response::Response;
use std::sync::Arc;

/// Result of a handler operation.
///
/// `Ok(None)` means the operation produced no response value; the dispatcher
/// then substitutes the default success response.
pub type HandlerResult = Result<Option<Response>, MochiError>;

/// An object whose named operations can be bound to routes.
///
/// # Example
///
/// ```rust
/// use mochi_core::{Handler, HandlerResult, MochiError, PathParams, Request, Response};
/// use http::StatusCode;
///
/// struct UserController;
///
/// impl Handler for UserController {
///     fn call(
///         &self,
///         operation: &str,
///         _request: &Request,
///         _response: Response,
///         params: &PathParams,
///     ) -> HandlerResult {
///         match operation {
///             "show" => {
///                 let id: u64 = params.parse("id")?;
///                 Ok(Some(Response::json(StatusCode::OK, &serde_json::json!({"id": id}))))
///             }
///             other => Err(MochiError::unknown_operation("UserController", other)),
///         }
///     }
/// }
/// ```
pub trait Handler: Send + Sync + 'static {
    /// Invokes the operation named `operation`.
    ///
    /// `response` is a fresh default response the operation may fill in and
    /// return.
    fn call(
        &self,
        operation: &str,
        request: &Request,
        response: Response,
        params: &PathParams,
    ) -> HandlerResult;
}

/// Resolves a handler instance as a trait object.
pub type HandlerFactory = fn(&Resolver) -> Result<Arc<dyn Handler>, ResolutionError>;

/// Returns the factory resolving `H` through the resolver cache.
#[must_use]
pub fn handler_factory<H: Handler>() -> HandlerFactory {
    resolve_handler::<H>
}

fn resolve_handler<H: Handler>(resolver: &Resolver) -> Result<Arc<dyn Handler>, ResolutionError> {
    resolver.resolve::<H>().map(|handler| handler as Arc<dyn Handler>)
}
