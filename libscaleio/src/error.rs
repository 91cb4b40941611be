//! Error types for the management client and the SDC driver channel.
//!
//! Every public operation in `libscaleio` returns [`ScaleioError`] on
//! failure.  REST failures that carry a parsed server body surface as
//! [`ScaleioError::Api`] wrapping an [`ApiError`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured error body returned by the REST gateway on non-2xx responses.
///
/// The gateway replies with `{"message": ..., "httpStatusCode": ..., "errorCode": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Human-readable message from the server.
    #[serde(default)]
    pub message: String,
    /// HTTP status code of the response.
    #[serde(default)]
    pub http_status_code: u16,
    /// Vendor specific error code.
    #[serde(default)]
    pub error_code: i64,
}

impl ApiError {
    /// Parse a non-2xx response body.
    ///
    /// The response `status` always wins over whatever the body claims.  A
    /// body that is not a JSON error object yields a generic error carrying
    /// only the status.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        match serde_json::from_slice::<ApiError>(body) {
            Ok(mut parsed) => {
                parsed.http_status_code = status;
                parsed
            }
            Err(e) => Self {
                message: format!("unable to parse error response body: {e}"),
                http_status_code: status,
                error_code: 0,
            },
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.http_status_code == 401
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "status {} (error code {}): {}",
            self.http_status_code, self.error_code, self.message
        )
    }
}

/// Unified error type for client and driver operations.
#[derive(Debug, Error, Clone)]
pub enum ScaleioError {
    /// Network failure, connection refusal, or request timeout.
    #[error("transport error: {0}")]
    Transport(String),

    /// Bad credentials, or re-authentication after an expired session failed.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Non-2xx response with a structured body.
    #[error("api error: {0}")]
    Api(ApiError),

    /// A 2xx response whose body could not be decoded.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The SDC device node is missing and mock mode is off.
    #[error("SDC driver not present at {0}")]
    DriverAbsent(String),

    /// The driver answered, but its return code or payload broke the protocol.
    #[error("driver protocol violation: {0}")]
    ProtocolViolation(String),

    /// Opening the device or issuing the ioctl failed at the OS level.
    #[error("device error: {0}")]
    Device(String),

    /// A facade lookup matched nothing.
    #[error("{0} not found")]
    NotFound(String),

    /// The caller supplied an invalid argument or configuration.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl ScaleioError {
    /// Create a [`ScaleioError::Transport`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn transport<E: fmt::Display>(e: E) -> Self {
        Self::Transport(e.to_string())
    }

    /// Create a [`ScaleioError::Authentication`] from anything that
    /// implements [`std::fmt::Display`].
    pub fn authentication<E: fmt::Display>(e: E) -> Self {
        Self::Authentication(e.to_string())
    }

    /// Create a [`ScaleioError::MalformedResponse`] from anything that
    /// implements [`std::fmt::Display`].
    pub fn malformed<E: fmt::Display>(e: E) -> Self {
        Self::MalformedResponse(e.to_string())
    }

    /// Create a [`ScaleioError::Device`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn device<E: fmt::Display>(e: E) -> Self {
        Self::Device(e.to_string())
    }

    /// Status code of a structured API error, if this is one.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Api(e) => Some(e.http_status_code),
            _ => None,
        }
    }
}

impl From<ApiError> for ScaleioError {
    fn from(e: ApiError) -> Self {
        Self::Api(e)
    }
}
