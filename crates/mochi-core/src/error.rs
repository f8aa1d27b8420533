//! Error types for Mochi.
//!
//! Three families of errors live here, one per phase of the dispatch core:
//!
//! | Type | Raised | Outcome |
//! |---|---|---|
//! | [`RegistrationError`] | while building the route table | fatal at startup |
//! | [`ResolutionError`] | while constructing a handler or middleware | 500 for the request |
//! | [`MochiError`] | by handler operations | rendered as a JSON error envelope |
//!
//! Route misses are not errors at this level; the dispatcher reports them as
//! lookup outcomes and turns them into fallback responses.

use http::StatusCode;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result of a handler operation.
pub type MochiResult<T> = Result<T, MochiError>;

/// Broad class of a [`MochiError`]; fixes its status and wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Request data broke validation rules.
    Validation,
    /// The request cannot be interpreted.
    BadRequest,
    /// The addressed resource does not exist.
    NotFound,
    /// The handler failed.
    Internal,
}

impl ErrorCategory {
    /// Status code sent for this category.
    #[must_use]
    pub const fn status_code(self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code written to the envelope.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::BadRequest => "BAD_REQUEST",
            Self::NotFound => "NOT_FOUND",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}

/// Error returned by handler operations.
///
/// The dispatcher renders it with [`MochiError::to_envelope`]:
///
/// ```json
/// {"error": {"code": "NOT_FOUND", "message": "...", "category": "not_found"}, "request_id": "..."}
/// ```
#[derive(Error, Debug)]
pub enum MochiError {
    /// Request data broke validation rules.
    #[error("{message}")]
    Validation {
        /// Summary shown to the client.
        message: String,
        /// Messages per offending field; may be empty.
        fields: FieldErrors,
    },

    /// The request cannot be interpreted, e.g. a path segment of the wrong type.
    #[error("{message}")]
    BadRequest {
        /// Shown to the client.
        message: String,
    },

    /// The addressed resource does not exist.
    #[error("{message}")]
    NotFound {
        /// Shown to the client.
        message: String,
        /// `(kind, id)` of the missing resource, when known.
        resource: Option<(String, String)>,
    },

    /// The handler failed. Only `message` reaches the client.
    #[error("{message}")]
    Internal {
        /// Shown to the client.
        message: String,
        /// Logged cause.
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl MochiError {
    /// Validation failure without per-field detail.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::validation_with_fields(message, FieldErrors::new())
    }

    /// Validation failure with messages per field.
    #[must_use]
    pub fn validation_with_fields(message: impl Into<String>, fields: FieldErrors) -> Self {
        Self::Validation {
            message: message.into(),
            fields,
        }
    }

    /// Malformed request.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Missing resource.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            resource: None,
        }
    }

    /// Missing resource of a known kind, e.g. `not_found_resource("User", "42")`.
    #[must_use]
    pub fn not_found_resource(kind: impl Into<String>, id: impl Into<String>) -> Self {
        let (kind, id) = (kind.into(), id.into());
        Self::NotFound {
            message: format!("{kind} `{id}` does not exist"),
            resource: Some((kind, id)),
        }
    }

    /// Handler failure.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Handler failure with a cause kept for logs.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// A route names an operation the handler does not implement.
    #[must_use]
    pub fn unknown_operation(handler: &str, operation: &str) -> Self {
        Self::internal(format!("{handler} has no operation named `{operation}`"))
    }

    /// Returns the category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::BadRequest { .. } => ErrorCategory::BadRequest,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the status code.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        self.category().status_code()
    }

    /// Builds the JSON envelope sent to the client.
    #[must_use]
    pub fn to_envelope(&self, request_id: Option<&str>) -> ErrorEnvelope {
        let category = self.category();
        let details = match self {
            Self::Validation { fields, .. } if !fields.is_empty() => {
                serde_json::to_value(fields).ok()
            }
            Self::NotFound {
                resource: Some((kind, id)),
                ..
            } => Some(serde_json::json!({ "resource": kind, "id": id })),
            _ => None,
        };

        ErrorEnvelope {
            error: ErrorDetail {
                code: category.code().to_string(),
                message: self.to_string(),
                category,
                details,
            },
            request_id: request_id.map(str::to_string),
        }
    }
}

/// Validation messages grouped by field, in the order fields were checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldErrors {
    /// Field name to messages.
    pub fields: IndexMap<String, Vec<String>>,
}

impl FieldErrors {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `message` against `field`.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Returns the messages recorded for a field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    /// Returns every message, field by field.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.fields.values().flatten().cloned().collect()
    }

    /// Returns `true` when nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the number of fields with messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

/// Body of an error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// What went wrong.
    pub error: ErrorDetail,
    /// Correlation id copied from the request, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// The `error` object of an [`ErrorEnvelope`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// See [`ErrorCategory::code`].
    pub code: String,
    /// The error's display text.
    pub message: String,
    /// The category.
    pub category: ErrorCategory,
    /// Field errors or the missing resource.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Malformed handler metadata detected while building the route table.
#[derive(Error, Debug)]
pub enum RegistrationError {
    /// The path template could not be parsed.
    #[error("invalid route template `{template}`: {reason}")]
    InvalidTemplate {
        /// The offending template.
        template: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A segment name appears twice in one template.
    #[error("route template `{template}` declares segment `{name}` more than once")]
    DuplicateSegment {
        /// The offending template.
        template: String,
        /// The repeated segment name.
        name: String,
    },

    /// A declared HTTP method is not a valid method token.
    #[error("{owner} declares invalid HTTP method `{method}`")]
    InvalidMethod {
        /// `Handler::operation` that declared the method.
        owner: String,
        /// The rejected method string.
        method: String,
    },

    /// An operation declared an empty method list.
    #[error("{owner} declares no HTTP methods")]
    NoMethods {
        /// `Handler::operation` with the empty list.
        owner: String,
    },

    /// A middleware id is not present in the middleware registry.
    #[error("{owner} references unknown middleware `{id}`")]
    UnknownMiddleware {
        /// Route or kernel referencing the middleware.
        owner: String,
        /// The unknown identifier.
        id: String,
    },

    /// A routed handler type has no provider in the resolver.
    #[error("handler {handler} is routed but has no provider")]
    UnboundHandler {
        /// The handler type name.
        handler: &'static str,
    },

    /// The compiled expression was rejected by the regex engine.
    #[error("route template `{template}` failed to compile")]
    Pattern {
        /// The offending template.
        template: String,
        /// The regex error.
        #[source]
        source: regex::Error,
    },
}

/// Chain of type names walked while resolving, outermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionChain(Vec<&'static str>);

impl ResolutionChain {
    /// Creates a chain from type names.
    #[must_use]
    pub fn new(names: Vec<&'static str>) -> Self {
        Self(names)
    }

    /// Returns the type names in resolution order.
    #[must_use]
    pub fn names(&self) -> &[&'static str] {
        &self.0
    }

    /// Returns `true` if the chain mentions the given type name.
    #[must_use]
    pub fn contains(&self, type_name: &str) -> bool {
        self.0.iter().any(|name| *name == type_name)
    }
}

impl fmt::Display for ResolutionChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        f.write_str(&self.0.join(" -> "))
    }
}

/// A type could not be constructed by the dependency resolver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// Nothing provides the requested type.
    #[error("cannot resolve {type_name}: no provider registered (chain: {chain})")]
    Unregistered {
        /// The requested type.
        type_name: &'static str,
        /// Types being resolved when the failure occurred.
        chain: ResolutionChain,
    },

    /// The type depends on itself, directly or transitively.
    #[error("dependency cycle detected while resolving {type_name}: {chain}")]
    Cycle {
        /// The type that closed the cycle.
        type_name: &'static str,
        /// Types being resolved, ending with the repeated type.
        chain: ResolutionChain,
    },

    /// A required constructor argument had no value.
    #[error("cannot construct {type_name}: missing argument `{parameter}` (chain: {chain})")]
    MissingArgument {
        /// The type being constructed.
        type_name: &'static str,
        /// The parameter name.
        parameter: &'static str,
        /// Types being resolved when the failure occurred.
        chain: ResolutionChain,
    },

    /// An argument was read with a different type than it was declared with.
    #[error(
        "cannot construct {type_name}: argument `{parameter}` is not a {expected} (chain: {chain})"
    )]
    TypeMismatch {
        /// The type being constructed.
        type_name: &'static str,
        /// The parameter name.
        parameter: &'static str,
        /// The type the constructor asked for.
        expected: &'static str,
        /// Types being resolved when the failure occurred.
        chain: ResolutionChain,
    },

    /// The constructor itself failed.
    #[error("cannot construct {type_name}: {reason} (chain: {chain})")]
    Construction {
        /// The type being constructed.
        type_name: &'static str,
        /// Constructor-supplied reason.
        reason: String,
        /// Types being resolved when the failure occurred.
        chain: ResolutionChain,
    },
}

impl ResolutionError {
    /// Returns the name of the type that could not be produced.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Unregistered { type_name, .. }
            | Self::Cycle { type_name, .. }
            | Self::MissingArgument { type_name, .. }
            | Self::TypeMismatch { type_name, .. }
            | Self::Construction { type_name, .. } => type_name,
        }
    }

    /// Returns the resolution chain at the point of failure.
    #[must_use]
    pub const fn chain(&self) -> &ResolutionChain {
        match self {
            Self::Unregistered { chain, .. }
            | Self::Cycle { chain, .. }
            | Self::MissingArgument { chain, .. }
            | Self::TypeMismatch { chain, .. }
            | Self::Construction { chain, .. } => chain,
        }
    }

    /// Returns `true` for dependency cycles.
    #[must_use]
    pub const fn is_cycle(&self) -> bool {
        matches!(self, Self::Cycle { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let error = MochiError::validation("Invalid email format");
        assert_eq!(error.category(), ErrorCategory::Validation);
        assert_eq!(error.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error.to_string(), "Invalid email format");
        assert!(error.to_envelope(None).error.details.is_none());
    }

    #[test]
    fn test_validation_envelope_lists_fields() {
        let mut fields = FieldErrors::new();
        fields.add("email", "The email must be a valid email address.");
        fields.add("name", "The name must be filled.");

        let envelope = MochiError::validation_with_fields("The given data was invalid.", fields)
            .to_envelope(Some("req-123"));
        let details = envelope.error.details.unwrap();
        assert_eq!(
            details["fields"]["email"][0],
            "The email must be a valid email address."
        );
        assert_eq!(envelope.error.code, "VALIDATION_ERROR");
        assert_eq!(envelope.request_id.as_deref(), Some("req-123"));
    }

    #[test]
    fn test_not_found_resource() {
        let error = MochiError::not_found_resource("User", "user-123");
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(error.to_string(), "User `user-123` does not exist");

        let details = error.to_envelope(None).error.details.unwrap();
        assert_eq!(details, serde_json::json!({"resource": "User", "id": "user-123"}));
    }

    #[test]
    fn test_internal_error_hides_source() {
        let error = MochiError::internal_with_source("storage failed", anyhow::anyhow!("disk full"));
        assert!(std::error::Error::source(&error).is_some());

        let json = serde_json::to_string(&error.to_envelope(None)).unwrap();
        assert!(json.contains("INTERNAL_ERROR"));
        assert!(!json.contains("disk full"));
    }

    #[test]
    fn test_unknown_operation() {
        let error = MochiError::unknown_operation("UserController", "destroy");
        assert_eq!(error.category(), ErrorCategory::Internal);
        assert_eq!(error.to_string(), "UserController has no operation named `destroy`");
    }

    #[test]
    fn test_envelope_wire_format() {
        let error = MochiError::bad_request("id must be numeric");
        let json = serde_json::to_value(error.to_envelope(Some("req-456"))).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "error": {
                    "code": "BAD_REQUEST",
                    "message": "id must be numeric",
                    "category": "bad_request"
                },
                "request_id": "req-456"
            })
        );
    }

    #[test]
    fn test_field_errors_preserve_order() {
        let mut errors = FieldErrors::new();
        assert!(errors.is_empty());

        errors.add("zeta", "first");
        errors.add("alpha", "second");
        errors.add("zeta", "third");

        assert_eq!(errors.len(), 2);
        assert_eq!(errors.messages(), vec!["first", "third", "second"]);
        assert_eq!(errors.get("zeta").map(<[String]>::len), Some(2));
    }

    #[test]
    fn test_categories_map_to_error_statuses() {
        for category in [
            ErrorCategory::Validation,
            ErrorCategory::BadRequest,
            ErrorCategory::NotFound,
            ErrorCategory::Internal,
        ] {
            let status = category.status_code();
            assert!(status.is_client_error() || status.is_server_error());
            assert!(!category.code().is_empty());
        }
    }

    #[test]
    fn test_resolution_chain_display() {
        let chain = ResolutionChain::new(vec!["A", "B", "A"]);
        assert_eq!(chain.to_string(), "A -> B -> A");
        assert_eq!(ResolutionChain::default().to_string(), "<root>");
    }

    #[test]
    fn test_resolution_error_accessors() {
        let err = ResolutionError::Cycle {
            type_name: "A",
            chain: ResolutionChain::new(vec!["A", "B", "A"]),
        };
        assert!(err.is_cycle());
        assert_eq!(err.type_name(), "A");
        assert!(err.to_string().contains("A -> B -> A"));
    }

    #[test]
    fn test_registration_error_display() {
        let err = RegistrationError::InvalidMethod {
            owner: "UserController::show".to_string(),
            method: "GE T".to_string(),
        };
        assert!(err.to_string().contains("UserController::show"));
        assert!(err.to_string().contains("GE T"));
    }
}
