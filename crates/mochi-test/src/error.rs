//! Test error types.

use thiserror::Error;

/// Errors raised by the test client.
#[derive(Debug, Error)]
pub enum TestError {
    /// The request could not be built.
    #[error("request build error: {0}")]
    RequestBuild(#[from] http::Error),

    /// The body is not valid UTF-8.
    #[error("body is not valid UTF-8: {0}")]
    BodyRead(#[from] std::string::FromUtf8Error),

    /// The body could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
