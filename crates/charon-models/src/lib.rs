//! Charon Models: type-safe procedures
//!
//! Each procedure pairs a request type with a response type through
//! [`TypeSafeRpc`], so the two cannot be mixed up across procedures.
//!
//! # Architecture
//!
//! - **TypeSafeRpcRequest**: domain fields in, validated `RpcDetails` out
//! - **TypeSafeRpcResponse**: the per-target values folded from successful results
//! - **TypeSafeRpc**: binds the two and owns the fold
//!
//! # Example
//!
//! ```
//! use charon_api::{RpcInvocationResult, RpcValue};
//! use charon_models::iblhs_amcms_get_ins::{IblhsAmcmsGetIns, Request};
//! use charon_models::{TypeSafeRpc, TypeSafeRpcRequest, TypeSafeRpcResponse};
//!
//! let details = Request::new("1234").as_details()?;
//! assert_eq!(details.name(), "IBLHS AMCMS GET INS");
//!
//! let response = IblhsAmcmsGetIns::from_results(vec![RpcInvocationResult::success(
//!     "500",
//!     RpcValue::Single("OK".into()),
//! )])?;
//! assert_eq!(response.results_by_target()["500"], "OK");
//! # Ok::<(), charon_models::MappingError>(())
//! ```

pub mod error;
pub mod iblhs_amcms_get_ins;
pub mod xobv_test_ping;
pub mod xobv_test_string;

pub use error::MappingError;

use charon_api::{RpcDetails, RpcInvocationResult};
use std::collections::BTreeMap;
use tracing::debug;

/// A domain request that renders itself as a generic RPC call
pub trait TypeSafeRpcRequest {
    /// Validate required fields and build the positional call
    ///
    /// Never performs I/O.
    fn as_details(&self) -> Result<RpcDetails, MappingError>;
}

/// A domain response aggregated across targets
pub trait TypeSafeRpcResponse {
    /// Parsed value for each target that succeeded, keyed by target id
    fn results_by_target(&self) -> &BTreeMap<String, String>;
}

/// Compile-time pairing of one procedure's request and response
pub trait TypeSafeRpc {
    /// Remote procedure name
    const NAME: &'static str;

    /// Remote option context the procedure runs under
    const CONTEXT: &'static str;

    type Request: TypeSafeRpcRequest;
    type Response: TypeSafeRpcResponse;

    /// Fold per-target results into the domain response
    ///
    /// Failures are dropped. Pure, no I/O.
    fn from_results(results: Vec<RpcInvocationResult>) -> Result<Self::Response, MappingError>;
}

/// Keep the successful results, keyed by target id, rendered as text
///
/// # Errors
///
/// `DuplicateTarget` if two successes share a target id.
pub fn fold_successes(
    results: Vec<RpcInvocationResult>,
) -> Result<BTreeMap<String, String>, MappingError> {
    let mut folded = BTreeMap::new();

    for result in results {
        match result.into_parts() {
            (target_id, Ok(value)) => {
                if folded.contains_key(&target_id) {
                    return Err(MappingError::DuplicateTarget(target_id));
                }
                folded.insert(target_id, value.as_text().into_owned());
            }
            (target_id, Err(error)) => {
                debug!("Dropping failed result for {}: {}", target_id, error);
            }
        }
    }

    Ok(folded)
}

/// Reject a blank required field
pub(crate) fn require<'a>(
    rpc: &'static str,
    field: &'static str,
    value: &'a str,
) -> Result<&'a str, MappingError> {
    if value.trim().is_empty() {
        Err(MappingError::InvalidRequest { rpc, field })
    } else {
        Ok(value)
    }
}
