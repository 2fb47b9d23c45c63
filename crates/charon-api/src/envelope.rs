//! Generic request/response envelope for running any RPC against a set of targets

use crate::details::RpcDetails;
use crate::principal::Credential;
use crate::result::RpcInvocationResult;
use serde::{Deserialize, Serialize};

/// Which configured targets a request should run against
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcTarget {
    #[serde(default)]
    pub include: Vec<String>,
}

impl RpcTarget {
    pub fn include<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            include: ids.into_iter().map(Into::into).collect(),
        }
    }
}

/// A generic RPC request: what to call, as whom, and where
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    pub rpc: RpcDetails,
    pub principal: Credential,
    #[serde(default)]
    pub target: RpcTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RpcResponseStatus {
    /// The operation ran; individual targets may still have failed
    Ok,
    /// The operation as a whole could not run
    Failed,
    /// The request named no targets
    NoVistasResolved,
}

/// Aggregated answer to an [`RpcRequest`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub status: RpcResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub results: Vec<RpcInvocationResult>,
}

impl RpcResponse {
    pub fn ok(results: Vec<RpcInvocationResult>) -> Self {
        let status = if results.is_empty() {
            RpcResponseStatus::NoVistasResolved
        } else {
            RpcResponseStatus::Ok
        };
        Self {
            status,
            message: None,
            results,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: RpcResponseStatus::Failed,
            message: Some(message.into()),
            results: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::RpcValue;

    #[test]
    fn test_request_from_json() {
        let request: RpcRequest = serde_json::from_str(
            r#"{
                "rpc": {"name": "XOBV TEST PING", "context": "XOBV VISTALINK TESTER"},
                "principal": {"accessCode": "ac", "verifyCode": "vc"},
                "target": {"include": ["500", "600"]}
            }"#,
        )
        .unwrap();

        assert_eq!(request.rpc.name(), "XOBV TEST PING");
        assert!(request.principal.is_complete());
        assert_eq!(request.target.include, vec!["500", "600"]);
    }

    #[test]
    fn test_response_status() {
        assert_eq!(
            RpcResponse::ok(vec![]).status,
            RpcResponseStatus::NoVistasResolved
        );

        let response = RpcResponse::ok(vec![RpcInvocationResult::success(
            "500",
            RpcValue::Single("OK".into()),
        )]);
        assert_eq!(response.status, RpcResponseStatus::Ok);

        let json = serde_json::to_value(RpcResponse::failed("Failed to login.")).unwrap();
        assert_eq!(json["status"], "FAILED");
        assert_eq!(json["message"], "Failed to login.");
    }
}
