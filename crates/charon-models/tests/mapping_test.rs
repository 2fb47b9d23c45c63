//! Integration tests for charon-models
//!
//! These drive each procedure through request rendering and result folding the
//! way the gateway does, without any network.

use charon_api::{ErrorDescriptor, ErrorKind, RpcInvocationResult, RpcValue};
use charon_models::iblhs_amcms_get_ins::{self, IblhsAmcmsGetIns};
use charon_models::xobv_test_ping::{self, XobvTestPing};
use charon_models::xobv_test_string::{self, XobvTestString};
use charon_models::{MappingError, TypeSafeRpc, TypeSafeRpcRequest, TypeSafeRpcResponse};

fn success(id: &str, value: &str) -> RpcInvocationResult {
    RpcInvocationResult::success(id, RpcValue::Single(value.into()))
}

fn failure(id: &str, kind: ErrorKind) -> RpcInvocationResult {
    RpcInvocationResult::failure(id, ErrorDescriptor::new(kind, format!("{} failed", id)))
}

/// Render a request the way the gateway does before dispatch
fn render<R: TypeSafeRpc>(request: &R::Request) -> Result<charon_api::RpcDetails, MappingError> {
    request.as_details()
}

#[test]
fn test_procedures_carry_their_own_identity() {
    let get_ins = render::<IblhsAmcmsGetIns>(&iblhs_amcms_get_ins::Request::new("1234")).unwrap();
    let ping = render::<XobvTestPing>(&xobv_test_ping::Request).unwrap();
    let echo = render::<XobvTestString>(&xobv_test_string::Request::new("hi")).unwrap();

    assert_eq!(
        (get_ins.name(), get_ins.parameters().len()),
        (IblhsAmcmsGetIns::NAME, 1)
    );
    assert_eq!(
        (ping.name(), ping.parameters().len()),
        (XobvTestPing::NAME, 0)
    );
    assert_eq!(
        (echo.name(), echo.parameters().len()),
        (XobvTestString::NAME, 1)
    );
    assert_eq!(ping.context(), echo.context());
}

#[test]
fn test_one_station_fails_authentication() {
    let results = vec![success("500", "OK"), failure("600", ErrorKind::Authentication)];

    let response = IblhsAmcmsGetIns::from_results(results).unwrap();

    assert_eq!(response.results_by_target().len(), 1);
    assert_eq!(response.results_by_target()["500"], "OK");
    assert!(!response.results_by_target().contains_key("600"));
}

#[test]
fn test_n_failures_of_m_leave_m_minus_n_entries() {
    let kinds = [
        ErrorKind::Authentication,
        ErrorKind::Timeout,
        ErrorKind::Transport,
        ErrorKind::Remote,
        ErrorKind::Parse,
    ];

    let mut results = Vec::new();
    for (i, kind) in kinds.iter().enumerate() {
        results.push(failure(&format!("F{}", i), *kind));
        results.push(success(&format!("S{}", i), "value"));
    }
    results.push(success("S-extra", "value"));

    let m = results.len();
    let n = kinds.len();
    let response = XobvTestPing::from_results(results).unwrap();
    assert_eq!(response.results_by_target().len(), m - n);
}

#[test]
fn test_success_only_round_trip() {
    let produced = [("500", "1^MEDICARE"), ("600", "2^TRICARE"), ("700", "")];
    let results = produced.iter().map(|(id, v)| success(id, v)).collect();

    let response = IblhsAmcmsGetIns::from_results(results).unwrap();

    assert_eq!(response.results_by_target().len(), produced.len());
    for (id, value) in produced {
        assert_eq!(response.results_by_target()[id], value);
    }
}

#[test]
fn test_empty_results_are_not_an_error() {
    let response = XobvTestString::from_results(Vec::new()).unwrap();
    assert!(response.results_by_target().is_empty());
}

#[test]
fn test_duplicate_station_is_rejected() {
    let err = IblhsAmcmsGetIns::from_results(vec![
        success("500", "first"),
        success("600", "other"),
        success("500", "second"),
    ])
    .unwrap_err();

    assert_eq!(err, MappingError::DuplicateTarget("500".into()));
    assert!(!err.is_invalid_request());
}

#[test]
fn test_request_from_json() {
    let request: iblhs_amcms_get_ins::Request =
        serde_json::from_str(r#"{"icn": "1011537977V693883"}"#).unwrap();
    let details = request.as_details().unwrap();
    assert_eq!(
        serde_json::to_value(details.parameters()).unwrap(),
        serde_json::json!([{"string": "1011537977V693883"}])
    );
}
