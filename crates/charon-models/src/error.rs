//! Error types for the charon-models crate

use charon_api::DetailsError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    /// A required domain field was absent or blank
    #[error("Invalid request for {rpc}: {field} is required")]
    InvalidRequest { rpc: &'static str, field: &'static str },

    #[error("Invalid RPC details: {0}")]
    Details(#[from] DetailsError),

    /// Two successful results carried the same target id
    #[error("Duplicate result for target {0}")]
    DuplicateTarget(String),
}

impl MappingError {
    pub fn is_invalid_request(&self) -> bool {
        matches!(
            self,
            MappingError::InvalidRequest { .. } | MappingError::Details(_)
        )
    }
}
