/*!
 * Error types for the Charon gateway
 */

use charon_api::{AuthenticationError, ErrorDescriptor, ErrorKind, RpcResponse};
use charon_connect::ConnectError;
use charon_models::MappingError;
use std::io;
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_FATAL: i32 = 2;
pub const EXIT_LOGIN: i32 = 3;

/// Failures of an operation as a whole
///
/// Failures confined to one target during a multi-target call never show up
/// here; they stay inside that target's result.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Request rejected before any network activity
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] MappingError),

    /// Single-target login failed
    #[error(transparent)]
    Authentication(#[from] AuthenticationError),

    /// Requested target ids that are not configured
    #[error("Unknown vista site specified: {}", .0.join(", "))]
    UnknownTarget(Vec<String>),

    /// Single-target call failed after login
    #[error("RPC on {target} failed: {error}")]
    Invocation {
        target: String,
        error: ErrorDescriptor,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to start dispatcher: {0}")]
    Dispatch(#[from] ConnectError),
}

impl GatewayError {
    /// HTTP-equivalent status for callers that expose the gateway over a network API
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::InvalidRequest(_) | GatewayError::UnknownTarget(_) => 400,
            GatewayError::Authentication(e) if e.is_credential_error() => 401,
            GatewayError::Authentication(e) if e.is_timeout() => 408,
            GatewayError::Authentication(_) => 502,
            GatewayError::Invocation { error, .. } if error.kind == ErrorKind::Timeout => 408,
            GatewayError::Invocation { .. } => 502,
            GatewayError::Config(_) | GatewayError::Io(_) | GatewayError::Dispatch(_) => 500,
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            GatewayError::Authentication(e) => e.is_timeout(),
            GatewayError::Invocation { error, .. } => error.kind == ErrorKind::Timeout,
            _ => false,
        }
    }

    /// Render a `FAILED` response envelope for this error
    pub fn failed_response(&self) -> RpcResponse {
        let message = match self {
            GatewayError::InvalidRequest(_) => "Failed to read request body.".to_string(),
            _ if self.is_timeout() => "Request timed out.".to_string(),
            GatewayError::Authentication(_) => "Failed to login.".to_string(),
            other => other.to_string(),
        };

        let response = RpcResponse::failed(message);
        match serde_json::to_string(&response) {
            Ok(json) => error!("Response: {}", json),
            Err(_) => error!("Response: {:?}", response),
        }
        response
    }

    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            GatewayError::Authentication(_) => EXIT_LOGIN,
            GatewayError::Invocation { .. } => EXIT_PARTIAL,
            _ => EXIT_FATAL,
        }
    }
}

impl From<toml::de::Error> for GatewayError {
    fn from(err: toml::de::Error) -> Self {
        GatewayError::Config(format!("Failed to parse configuration: {}", err))
    }
}

impl From<toml::ser::Error> for GatewayError {
    fn from(err: toml::ser::Error) -> Self {
        GatewayError::Config(format!("Failed to serialize configuration: {}", err))
    }
}
