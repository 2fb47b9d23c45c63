//! Error types for the charon-api crate

use crate::result::{ErrorDescriptor, ErrorKind};
use std::io;
use std::time::Duration;
use thiserror::Error;

/// An [`RpcDetails`](crate::RpcDetails) could not be built
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DetailsError {
    #[error("RPC name is required")]
    MissingName,

    #[error("RPC context is required for {rpc}")]
    MissingContext { rpc: String },
}

/// A serialized invocation result violated the success-xor-failure shape
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvocationShapeError {
    #[error("Result for {vista} has both a response and an error")]
    BothPopulated { vista: String },

    #[error("Result for {vista} has neither a response nor an error")]
    NeitherPopulated { vista: String },
}

/// Failure to establish an authenticated session with one target
///
/// The variants keep bad credentials, network failures and timeouts apart so
/// callers can map them to different external statuses.
#[derive(Error, Debug)]
pub enum AuthenticationError {
    #[error("Credential for {target} is incomplete: access and verify codes are required")]
    InvalidCredential { target: String },

    #[error("Invalid target {target}: {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("Login to {target} rejected: {reason}")]
    Rejected { target: String, reason: String },

    #[error("Connection to {target} failed: {source}")]
    Network {
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("Login to {target} timed out after {}ms", .after.as_millis())]
    Timeout { target: String, after: Duration },

    #[error("Login protocol error with {target}: {message}")]
    Protocol { target: String, message: String },
}

impl AuthenticationError {
    /// Logical id of the target the login was attempted against
    pub fn target(&self) -> &str {
        match self {
            AuthenticationError::InvalidCredential { target }
            | AuthenticationError::InvalidTarget { target, .. }
            | AuthenticationError::Rejected { target, .. }
            | AuthenticationError::Network { target, .. }
            | AuthenticationError::Timeout { target, .. }
            | AuthenticationError::Protocol { target, .. } => target,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, AuthenticationError::Timeout { .. })
    }

    /// Credentials were refused or never usable
    pub fn is_credential_error(&self) -> bool {
        matches!(
            self,
            AuthenticationError::Rejected { .. } | AuthenticationError::InvalidCredential { .. }
        )
    }

    /// Per-target descriptor used when the failure is contained in a result
    pub fn to_descriptor(&self) -> ErrorDescriptor {
        let kind = if self.is_timeout() {
            ErrorKind::Timeout
        } else {
            ErrorKind::Authentication
        };
        ErrorDescriptor::new(kind, self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_causes_are_distinguishable() {
        let rejected = AuthenticationError::Rejected {
            target: "600".into(),
            reason: "Not a valid ACCESS CODE/VERIFY CODE pair.".into(),
        };
        assert!(rejected.is_credential_error());
        assert!(!rejected.is_timeout());
        assert_eq!(rejected.target(), "600");
        assert_eq!(rejected.to_descriptor().kind, ErrorKind::Authentication);

        let timeout = AuthenticationError::Timeout {
            target: "600".into(),
            after: Duration::from_millis(1500),
        };
        assert!(timeout.is_timeout());
        assert_eq!(timeout.to_string(), "Login to 600 timed out after 1500ms");
        assert_eq!(timeout.to_descriptor().kind, ErrorKind::Timeout);

        let network = AuthenticationError::Network {
            target: "600".into(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        assert!(!network.is_credential_error());
        assert!(!network.is_timeout());
    }
}
