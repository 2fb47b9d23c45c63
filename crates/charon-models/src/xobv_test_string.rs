//! Echo round trip against the VistaLink tester context

use crate::{
    fold_successes, require, MappingError, TypeSafeRpc, TypeSafeRpcRequest, TypeSafeRpcResponse,
};
use charon_api::{Parameter, RpcDetails, RpcInvocationResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `XOBV TEST STRING`
#[derive(Debug, Clone, Copy, Default)]
pub struct XobvTestString;

impl TypeSafeRpc for XobvTestString {
    const NAME: &'static str = "XOBV TEST STRING";
    const CONTEXT: &'static str = "XOBV VISTALINK TESTER";

    type Request = Request;
    type Response = Response;

    fn from_results(results: Vec<RpcInvocationResult>) -> Result<Response, MappingError> {
        Ok(Response {
            echoes_by_station: fold_successes(results)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Text the remote side echoes back
    #[serde(default)]
    pub value: String,
}

impl Request {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

impl TypeSafeRpcRequest for Request {
    fn as_details(&self) -> Result<RpcDetails, MappingError> {
        let value = require(XobvTestString::NAME, "value", &self.value)?;
        Ok(RpcDetails::builder()
            .name(XobvTestString::NAME)
            .context(XobvTestString::CONTEXT)
            .parameter(Parameter::string(value))
            .build()?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[serde(default)]
    pub echoes_by_station: BTreeMap<String, String>,
}

impl TypeSafeRpcResponse for Response {
    fn results_by_target(&self) -> &BTreeMap<String, String> {
        &self.echoes_by_station
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_is_first_parameter() {
        let details = Request::new("hello vista").as_details().unwrap();
        assert_eq!(
            details.positional_parameters().collect::<Vec<_>>(),
            vec![(1, &Parameter::String("hello vista".into()))]
        );
    }

    #[test]
    fn test_blank_value_is_invalid() {
        assert!(matches!(
            Request::new("").as_details(),
            Err(MappingError::InvalidRequest { field: "value", .. })
        ));
    }
}
