//! Insurance lookup for a patient across stations

use crate::{
    fold_successes, require, MappingError, TypeSafeRpc, TypeSafeRpcRequest, TypeSafeRpcResponse,
};
use charon_api::{Parameter, RpcDetails, RpcInvocationResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `IBLHS AMCMS GET INS`
#[derive(Debug, Clone, Copy, Default)]
pub struct IblhsAmcmsGetIns;

impl TypeSafeRpc for IblhsAmcmsGetIns {
    const NAME: &'static str = "IBLHS AMCMS GET INS";
    const CONTEXT: &'static str = "IBLHS AMCMS RPCS";

    type Request = Request;
    type Response = Response;

    fn from_results(results: Vec<RpcInvocationResult>) -> Result<Response, MappingError> {
        Ok(Response {
            results_by_station: fold_successes(results)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Integration control number of the patient
    #[serde(default)]
    pub icn: String,
}

impl Request {
    pub fn new(icn: impl Into<String>) -> Self {
        Self { icn: icn.into() }
    }
}

impl TypeSafeRpcRequest for Request {
    fn as_details(&self) -> Result<RpcDetails, MappingError> {
        let icn = require(IblhsAmcmsGetIns::NAME, "icn", &self.icn)?;
        Ok(RpcDetails::builder()
            .name(IblhsAmcmsGetIns::NAME)
            .context(IblhsAmcmsGetIns::CONTEXT)
            .parameter(Parameter::string(icn))
            .build()?)
    }
}

/// Raw insurance text per station
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
    use charon_api::{ErrorDescriptor, ErrorKind, RpcValue};

    #[test]
    fn test_icn_becomes_single_string_parameter() {
        let details = Request::new("1234").as_details().unwrap();

        assert_eq!(details.name(), "IBLHS AMCMS GET INS");
        assert_eq!(details.context(), "IBLHS AMCMS RPCS");
        assert_eq!(details.version(), None);
        assert_eq!(details.parameters(), &[Parameter::String("1234".into())]);
    }

    #[test]
    fn test_blank_icn_is_invalid() {
        let err = Request::new(" ").as_details().unwrap_err();
        assert_eq!(
            err,
            MappingError::InvalidRequest {
                rpc: "IBLHS AMCMS GET INS",
                field: "icn"
            }
        );
        assert!(err.is_invalid_request());
    }

    #[test]
    fn test_missing_icn_deserializes_then_fails_validation() {
        let request: Request = serde_json::from_str("{}").unwrap();
        assert!(request.as_details().is_err());
    }

    #[test]
    fn test_fold_keeps_successful_stations() {
        let response = IblhsAmcmsGetIns::from_results(vec![
            RpcInvocationResult::success("500", RpcValue::Single("OK".into())),
            RpcInvocationResult::failure(
                "600",
                ErrorDescriptor::new(ErrorKind::Authentication, "Login to 600 rejected"),
            ),
        ])
        .unwrap();

        assert_eq!(response.results_by_target().len(), 1);
        assert_eq!(response.results_by_station["500"], "OK");
    }

    #[test]
    fn test_response_json_shape() {
        let response = IblhsAmcmsGetIns::from_results(vec![RpcInvocationResult::success(
            "500",
            RpcValue::Single("OK".into()),
        )])
        .unwrap();

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            serde_json::json!({"resultsByStation": {"500": "OK"}})
        );
    }
}
