//! Gateway facade: request validation, target resolution, dispatch and folding
//!
//! Operation-level problems (bad request, unknown target) are reported before
//! any connection is opened. Once dispatch starts, per-target failures stay in
//! the per-target results.

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::registry::TargetRegistry;
use charon_api::{
    Credential, RpcDetails, RpcInvocationResult, RpcInvokerFactory, RpcRequest, RpcResponse,
    RpcValue,
};
use charon_connect::{MultiTargetDispatcher, ResolvedTarget, VistalinkRpcInvokerFactory};
use charon_models::{TypeSafeRpc, TypeSafeRpcRequest};
use tracing::{debug, info};

/// Runs RPCs against configured sites on behalf of a caller
///
/// # Example
///
/// ```no_run
/// use charon::config::GatewayConfig;
/// use charon::service::Gateway;
/// use charon_api::Credential;
/// use charon_models::iblhs_amcms_get_ins::{IblhsAmcmsGetIns, Request};
/// use std::path::Path;
///
/// let config = GatewayConfig::from_file(Path::new("charon.toml"))?;
/// let gateway = Gateway::from_config(&config)?;
///
/// let response = gateway.call::<IblhsAmcmsGetIns>(
///     &Request::new("1011537977V693883"),
///     &Credential::new("ac", "vc"),
///     &["500".to_string(), "600".to_string()],
/// )?;
/// println!("{:?}", response.results_by_station);
/// # Ok::<(), charon::error::GatewayError>(())
/// ```
pub struct Gateway<F = VistalinkRpcInvokerFactory> {
    registry: TargetRegistry,
    dispatcher: MultiTargetDispatcher<F>,
}

impl Gateway<VistalinkRpcInvokerFactory> {
    /// Build a gateway that talks to the configured sites over the network
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        config.validate()?;

        let factory = VistalinkRpcInvokerFactory::new(config.invoker_settings());
        let mut dispatcher = MultiTargetDispatcher::new(factory);
        if let Some(max_parallel) = config.dispatch.max_parallel {
            dispatcher = dispatcher.with_max_parallel(max_parallel)?;
        }

        Ok(Self::new(TargetRegistry::from_config(config), dispatcher))
    }
}

impl<F: RpcInvokerFactory> Gateway<F> {
    pub fn new(registry: TargetRegistry, dispatcher: MultiTargetDispatcher<F>) -> Self {
        Self {
            registry,
            dispatcher,
        }
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    /// Run a generic request against every target it includes
    ///
    /// An empty include list yields `NO_VISTAS_RESOLVED` without contacting
    /// anything.
    pub fn execute(&self, request: &RpcRequest) -> Result<RpcResponse> {
        let results = self.run(&request.rpc, &request.principal, &request.target.include)?;
        Ok(RpcResponse::ok(results))
    }

    /// Run a type-safe procedure and fold the results into its response
    ///
    /// The request is validated before targets are resolved, so an invalid
    /// request never opens a connection.
    pub fn call<R: TypeSafeRpc>(
        &self,
        request: &R::Request,
        credential: &Credential,
        include: &[String],
    ) -> Result<R::Response> {
        let details = request.as_details()?;
        let results = self.run(&details, credential, include)?;
        Ok(R::from_results(results)?)
    }

    /// Run one RPC against a single target, surfacing any failure as an error
    pub fn invoke_one(
        &self,
        details: &RpcDetails,
        credential: &Credential,
        target_id: &str,
    ) -> Result<RpcValue> {
        let descriptor = self
            .registry
            .get(target_id)
            .ok_or_else(|| GatewayError::UnknownTarget(vec![target_id.to_string()]))?;

        let mut invoker = self.dispatcher.factory().create(credential, descriptor)?;
        let result = invoker.invoke(details);
        invoker.close();

        match result.into_parts() {
            (_, Ok(value)) => Ok(value),
            (target, Err(error)) => Err(GatewayError::Invocation { target, error }),
        }
    }

    fn run(
        &self,
        details: &RpcDetails,
        credential: &Credential,
        include: &[String],
    ) -> Result<Vec<RpcInvocationResult>> {
        let targets: Vec<ResolvedTarget> = self
            .registry
            .resolve(include)?
            .into_iter()
            .map(|descriptor| ResolvedTarget::new(descriptor, credential.clone()))
            .collect();

        if targets.is_empty() {
            debug!("{} requested with no targets", details.name());
            return Ok(Vec::new());
        }

        info!(
            "Running {} against {} site(s)",
            details.name(),
            targets.len()
        );
        Ok(self.dispatcher.dispatch(details, &targets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::init_test_logging;
    use charon_api::{ErrorKind, RpcResponseStatus, RpcTarget, TargetDescriptor};
    use charon_connect::mock::{MockInvokerFactory, MockOutcome};
    use charon_models::iblhs_amcms_get_ins::{self, IblhsAmcmsGetIns};

    fn gateway(factory: MockInvokerFactory) -> Gateway<MockInvokerFactory> {
        init_test_logging();
        let registry = TargetRegistry::new(vec![
            TargetDescriptor::new("500", "vista-500", 18500, "605"),
            TargetDescriptor::new("600", "vista-600", 18600, "605"),
        ]);
        Gateway::new(registry, MultiTargetDispatcher::new(factory))
    }

    fn sites(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn ok(value: &str) -> MockOutcome {
        MockOutcome::Respond(RpcValue::Single(value.into()))
    }

    #[test]
    fn test_call_folds_successes() {
        let factory = MockInvokerFactory::new()
            .with_target("500", ok("OK"))
            .with_target("600", MockOutcome::RejectLogin("bad verify code".into()));
        let gateway = gateway(factory.clone());

        let response = gateway
            .call::<IblhsAmcmsGetIns>(
                &iblhs_amcms_get_ins::Request::new("1234"),
                &Credential::new("ac", "vc"),
                &sites(&["500", "600"]),
            )
            .unwrap();

        assert_eq!(response.results_by_station.len(), 1);
        assert_eq!(response.results_by_station["500"], "OK");
        assert_eq!(
            factory.invocations(),
            vec![("500".to_string(), "IBLHS AMCMS GET INS".to_string())]
        );
    }

    #[test]
    fn test_invalid_request_opens_nothing() {
        let factory = MockInvokerFactory::new().with_target("500", ok("OK"));
        let gateway = gateway(factory.clone());

        let err = gateway
            .call::<IblhsAmcmsGetIns>(
                &iblhs_amcms_get_ins::Request::new(""),
                &Credential::new("ac", "vc"),
                &sites(&["500"]),
            )
            .unwrap_err();

        assert!(matches!(err, GatewayError::InvalidRequest(_)));
        assert_eq!(err.status_code(), 400);
        assert_eq!(factory.created(), 0);
    }

    #[test]
    fn test_unknown_target_opens_nothing() {
        let factory = MockInvokerFactory::new().with_target("500", ok("OK"));
        let gateway = gateway(factory.clone());

        let err = gateway
            .call::<IblhsAmcmsGetIns>(
                &iblhs_amcms_get_ins::Request::new("1234"),
                &Credential::new("ac", "vc"),
                &sites(&["500", "999"]),
            )
            .unwrap_err();

        assert!(matches!(err, GatewayError::UnknownTarget(ref ids) if ids == &sites(&["999"])));
        assert_eq!(factory.created(), 0);
    }

    #[test]
    fn test_execute_envelope() {
        let factory = MockInvokerFactory::new()
            .with_target("500", ok("1"))
            .with_target("600", ok("1"));
        let gateway = gateway(factory.clone());

        let request = RpcRequest {
            rpc: RpcDetails::builder()
                .name("XOBV TEST PING")
                .context("XOBV VISTALINK TESTER")
                .build()
                .unwrap(),
            principal: Credential::new("ac", "vc"),
            target: RpcTarget::include(["600", "500"]),
        };
        let response = gateway.execute(&request).unwrap();

        assert_eq!(response.status, RpcResponseStatus::Ok);
        let order: Vec<&str> = response.results.iter().map(|r| r.target_id()).collect();
        assert_eq!(order, vec!["600", "500"]);
        assert_eq!(factory.closed(), 2);
    }

    #[test]
    fn test_execute_with_no_targets() {
        let factory = MockInvokerFactory::new();
        let gateway = gateway(factory.clone());

        let request = RpcRequest {
            rpc: RpcDetails::builder()
                .name("XOBV TEST PING")
                .context("XOBV VISTALINK TESTER")
                .build()
                .unwrap(),
            principal: Credential::new("ac", "vc"),
            target: RpcTarget::default(),
        };
        let response = gateway.execute(&request).unwrap();

        assert_eq!(response.status, RpcResponseStatus::NoVistasResolved);
        assert!(response.results.is_empty());
        assert_eq!(factory.created(), 0);
    }

    #[test]
    fn test_invoke_one_surfaces_login_failure() {
        let factory = MockInvokerFactory::new()
            .with_target("600", MockOutcome::RejectLogin("bad verify code".into()));
        let gateway = gateway(factory);

        let ping = RpcDetails::builder()
            .name("XOBV TEST PING")
            .context("XOBV VISTALINK TESTER")
            .build()
            .unwrap();
        let err = gateway
            .invoke_one(&ping, &Credential::new("ac", "vc"), "600")
            .unwrap_err();

        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn test_invoke_one_surfaces_remote_failure() {
        let factory = MockInvokerFactory::new().with_target(
            "500",
            MockOutcome::Fail(charon_api::ErrorDescriptor::new(
                ErrorKind::Remote,
                "RPC_NOT_FOUND: no such RPC",
            )),
        );
        let gateway = gateway(factory.clone());

        let ping = RpcDetails::builder()
            .name("XOBV TEST PING")
            .context("XOBV VISTALINK TESTER")
            .build()
            .unwrap();
        let err = gateway
            .invoke_one(&ping, &Credential::new("ac", "vc"), "500")
            .unwrap_err();

        assert!(matches!(err, GatewayError::Invocation { ref target, .. } if target == "500"));
        assert_eq!(err.status_code(), 502);
        assert_eq!(factory.closed(), 1);
    }
}
