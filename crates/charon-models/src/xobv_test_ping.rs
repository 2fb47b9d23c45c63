//! Connectivity check against the VistaLink tester context

use crate::{fold_successes, MappingError, TypeSafeRpc, TypeSafeRpcRequest, TypeSafeRpcResponse};
use charon_api::{RpcDetails, RpcInvocationResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `XOBV TEST PING`
#[derive(Debug, Clone, Copy, Default)]
pub struct XobvTestPing;

impl TypeSafeRpc for XobvTestPing {
    const NAME: &'static str = "XOBV TEST PING";
    const CONTEXT: &'static str = "XOBV VISTALINK TESTER";

    type Request = Request;
    type Response = Response;

    fn from_results(results: Vec<RpcInvocationResult>) -> Result<Response, MappingError> {
        Ok(Response {
            results_by_station: fold_successes(results)?,
        })
    }
}

/// Takes no parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Request;

impl TypeSafeRpcRequest for Request {
    fn as_details(&self) -> Result<RpcDetails, MappingError> {
        Ok(RpcDetails::builder()
            .name(XobvTestPing::NAME)
            .context(XobvTestPing::CONTEXT)
            .build()?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[serde(default)]
    pub results_by_station: BTreeMap<String, String>,
}

impl TypeSafeRpcResponse for Response {
    fn results_by_target(&self) -> &BTreeMap<String, String> {
        &self.results_by_station
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_has_no_parameters() {
        let details = Request.as_details().unwrap();
        assert_eq!(details.name(), "XOBV TEST PING");
        assert_eq!(details.context(), "XOBV VISTALINK TESTER");
        assert!(details.parameters().is_empty());
    }

    #[test]
    fn test_empty_results_fold_to_empty_response() {
        let response = XobvTestPing::from_results(Vec::new()).unwrap();
        assert!(response.results_by_target().is_empty());
    }
}
