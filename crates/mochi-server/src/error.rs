//! Server and dispatch errors.

use http::Method;
use mochi_core::ResolutionError;
use mochi_middleware::MiddlewareError;
use thiserror::Error;

/// Why a request was not handed to a handler.
///
/// [`Dispatcher::dispatch`](crate::Dispatcher::dispatch) turns every variant
/// into a fallback response.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// No route pattern matches the path.
    #[error("no route matches the request path")]
    NotFound,

    /// A pattern matches the path, but not under the request method.
    #[error("method not allowed; allowed: {}", join_methods(.allowed))]
    MethodNotAllowed {
        /// Methods answered for this path.
        allowed: Vec<Method>,
    },

    /// The handler could not be constructed.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// A middleware could not be produced.
    #[error(transparent)]
    Middleware(#[from] MiddlewareError),
}

fn join_methods(methods: &[Method]) -> String {
    methods
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors from running the HTTP server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The configured address is invalid or could not be bound.
    #[error("bind error: {0}")]
    Bind(String),

    /// I/O failure while serving.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use mochi_core::ResolutionChain;

    #[test]
    fn test_method_not_allowed_display() {
        let err = DispatchError::MethodNotAllowed {
            allowed: vec![Method::GET, Method::HEAD],
        };
        assert_eq!(err.to_string(), "method not allowed; allowed: GET, HEAD");
    }

    #[test]
    fn test_resolution_is_transparent() {
        let err: DispatchError = ResolutionError::Unregistered {
            type_name: "app::Mailer",
            chain: ResolutionChain::new(vec!["app::UserController"]),
        }
        .into();
        assert!(err.to_string().contains("app::Mailer"));
    }

    #[test]
    fn test_server_error_display() {
        assert!(ServerError::Bind("127.0.0.1:1".into())
            .to_string()
            .starts_with("bind error"));
    }
}
