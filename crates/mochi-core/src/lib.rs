//! # Mochi Core
//!
//! Core types for the Mochi dispatch core.
//!
//! - [`Request`] / [`Response`] - The values handed through middleware to handlers
//! - [`PathParams`] - Named segments captured from the request path
//! - [`Handler`] - Objects exposing named operations bound to routes
//! - [`di::Resolver`] - Cached constructor-dependency resolution
//! - [`MochiError`], [`RegistrationError`], [`ResolutionError`] - Error taxonomy
//! - [`validator`] - Rule-based validation of request data
//! - [`renderer`] - JSON and template rendering helpers

#![doc(html_root_url = "https://docs.rs/mochi-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod di;
mod error;
mod handler;
mod params;
pub mod renderer;
mod request;
mod response;
pub mod validator;

pub use di::{Injectable, Resolver, TypeKey};
pub use error::{
    ErrorCategory, ErrorDetail, ErrorEnvelope, FieldErrors, MochiError, MochiResult,
    RegistrationError, ResolutionChain, ResolutionError,
};
pub use handler::{handler_factory, Handler, HandlerFactory, HandlerResult};
pub use params::PathParams;
pub use request::{Request, RequestBuilder};
pub use response::{Body, Response};
