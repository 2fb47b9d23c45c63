//! Runs one RPC against many targets with per-target failure isolation

use crate::error::ConnectError;
use charon_api::{
    Credential, ErrorDescriptor, ErrorKind, RpcDetails, RpcInvocationResult, RpcInvoker,
    RpcInvokerFactory, TargetDescriptor,
};
use rayon::prelude::*;
use std::any::Any;
use std::ops::{Deref, DerefMut};
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, info, warn};

/// A target paired with the credential to log in with
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    pub descriptor: TargetDescriptor,
    pub credential: Credential,
}

impl ResolvedTarget {
    pub fn new(descriptor: TargetDescriptor, credential: Credential) -> Self {
        Self {
            descriptor,
            credential,
        }
    }

    pub fn target_id(&self) -> &str {
        &self.descriptor.target_id
    }
}

/// Closes the wrapped invoker when dropped, including during unwinding
struct InvokerGuard(Box<dyn RpcInvoker>);

impl Deref for InvokerGuard {
    type Target = dyn RpcInvoker;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl DerefMut for InvokerGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.as_mut()
    }
}

impl Drop for InvokerGuard {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Invokes one RPC once per target
///
/// Each target gets its own invoker: opened, used for exactly one call, and
/// closed before `dispatch` returns. A failure on one target (login, transport,
/// remote fault, even a panicking invoker) becomes a failure result for that
/// target only.
///
/// Targets run in parallel on rayon. Results come back in input order.
///
/// # Example
///
/// ```no_run
/// use charon_api::{Credential, RpcDetails, TargetDescriptor};
/// use charon_connect::{MultiTargetDispatcher, ResolvedTarget, VistalinkRpcInvokerFactory};
///
/// let dispatcher = MultiTargetDispatcher::new(VistalinkRpcInvokerFactory::default());
/// let ping = RpcDetails::builder()
///     .name("XOBV TEST PING")
///     .context("XOBV VISTALINK TESTER")
///     .build()
///     .unwrap();
/// let targets = vec![ResolvedTarget::new(
///     TargetDescriptor::new("500", "vista.example.org", 18500, "605"),
///     Credential::new("ac", "vc"),
/// )];
///
/// for result in dispatcher.dispatch(&ping, &targets) {
///     println!("{}: {:?}", result.target_id(), result.outcome());
/// }
/// ```
pub struct MultiTargetDispatcher<F> {
    factory: F,
    pool: Option<rayon::ThreadPool>,
}

impl<F: RpcInvokerFactory> MultiTargetDispatcher<F> {
    /// Dispatch on the global rayon pool
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            pool: None,
        }
    }

    /// Dispatch on a dedicated pool of at most `max_parallel` threads
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Result<Self, ConnectError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(max_parallel.max(1))
            .thread_name(|i| format!("charon-dispatch-{}", i))
            .build()?;
        self.pool = Some(pool);
        Ok(self)
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Run `details` against every target, returning one result per target in
    /// input order
    pub fn dispatch(
        &self,
        details: &RpcDetails,
        targets: &[ResolvedTarget],
    ) -> Vec<RpcInvocationResult> {
        if targets.is_empty() {
            debug!("No targets for {}", details.name());
            return Vec::new();
        }

        info!(
            "Dispatching {} to {} target(s)",
            details.name(),
            targets.len()
        );

        let run = || {
            targets
                .par_iter()
                .map(|target| self.invoke_one(details, target))
                .collect::<Vec<_>>()
        };

        let results = match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        };

        let failed = results.iter().filter(|r| !r.is_success()).count();
        info!(
            "{} finished: {} succeeded, {} failed",
            details.name(),
            results.len() - failed,
            failed
        );

        results
    }

    fn invoke_one(&self, details: &RpcDetails, target: &ResolvedTarget) -> RpcInvocationResult {
        let target_id = target.target_id();

        let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
            let invoker = match self.factory.create(&target.credential, &target.descriptor) {
                Ok(invoker) => invoker,
                Err(e) => {
                    warn!("Login to {} failed: {}", target_id, e);
                    return RpcInvocationResult::failure(target_id, e.to_descriptor());
                }
            };

            let mut invoker = InvokerGuard(invoker);
            invoker.invoke(details)
        }));

        let result = match attempt {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!("Invoker for {} panicked: {}", target_id, message);
                RpcInvocationResult::failure(
                    target_id,
                    ErrorDescriptor::new(
                        ErrorKind::Internal,
                        format!("invoker panicked: {}", message),
                    ),
                )
            }
        };

        if result.target_id() == target_id {
            return result;
        }

        warn!(
            "Invoker for {} tagged its result as {}; retagging",
            target_id,
            result.target_id()
        );
        match result.into_parts() {
            (_, Ok(value)) => RpcInvocationResult::success(target_id, value),
            (_, Err(error)) => RpcInvocationResult::failure(target_id, error),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockInvokerFactory, MockOutcome};
    use charon_api::RpcValue;

    fn ping() -> RpcDetails {
        RpcDetails::builder()
            .name("XOBV TEST PING")
            .context("XOBV VISTALINK TESTER")
            .build()
            .unwrap()
    }

    fn target(id: &str) -> ResolvedTarget {
        ResolvedTarget::new(
            TargetDescriptor::new(id, "localhost", 18000, "605"),
            Credential::new("ac", "vc"),
        )
    }

    #[test]
    fn test_empty_target_set() {
        let factory = MockInvokerFactory::new();
        let dispatcher = MultiTargetDispatcher::new(factory.clone());

        assert!(dispatcher.dispatch(&ping(), &[]).is_empty());
        assert_eq!(factory.created(), 0);
    }

    #[test]
    fn test_login_failure_is_isolated() {
        let factory = MockInvokerFactory::new()
            .with_target("500", MockOutcome::Respond(RpcValue::Single("OK".into())))
            .with_target("600", MockOutcome::RejectLogin("bad verify code".into()));
        let dispatcher = MultiTargetDispatcher::new(factory.clone());

        let results = dispatcher.dispatch(&ping(), &[target("500"), target("600")]);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].target_id(), "500");
        assert_eq!(results[0].response(), Some(&RpcValue::Single("OK".into())));
        assert_eq!(results[1].target_id(), "600");
        assert_eq!(results[1].error().unwrap().kind, ErrorKind::Authentication);
        assert_eq!(factory.created(), 1);
        assert_eq!(factory.closed(), 1);
    }

    #[test]
    fn test_panicking_invoker_is_contained_and_closed() {
        let factory = MockInvokerFactory::new()
            .with_target("500", MockOutcome::Panic("boom".into()))
            .with_target("600", MockOutcome::Respond(RpcValue::Single("OK".into())));
        let dispatcher = MultiTargetDispatcher::new(factory.clone());

        let results = dispatcher.dispatch(&ping(), &[target("500"), target("600")]);

        let error = results[0].error().unwrap();
        assert_eq!(error.kind, ErrorKind::Internal);
        assert!(error.message.contains("boom"));
        assert!(results[1].is_success());
        assert_eq!(factory.closed(), 2);
    }

    #[test]
    fn test_order_is_stable_on_bounded_pool() {
        let ids: Vec<String> = (0..16).map(|i| format!("{}", 500 + i)).collect();
        let mut factory = MockInvokerFactory::new();
        for id in &ids {
            factory = factory.with_target(id, MockOutcome::Respond(RpcValue::Single(id.clone())));
        }
        let dispatcher = MultiTargetDispatcher::new(factory.clone())
            .with_max_parallel(4)
            .unwrap();

        let targets: Vec<ResolvedTarget> = ids.iter().map(|id| target(id)).collect();
        let results = dispatcher.dispatch(&ping(), &targets);

        let returned: Vec<&str> = results.iter().map(|r| r.target_id()).collect();
        assert_eq!(returned, ids.iter().map(String::as_str).collect::<Vec<_>>());
        assert_eq!(factory.created(), 16);
        assert_eq!(factory.closed(), 16);
    }

    #[test]
    fn test_mistagged_result_is_retagged() {
        let factory = MockInvokerFactory::new().with_target(
            "500",
            MockOutcome::RespondAs("999".into(), RpcValue::Single("OK".into())),
        );
        let dispatcher = MultiTargetDispatcher::new(factory);

        let results = dispatcher.dispatch(&ping(), &[target("500")]);
        assert_eq!(results[0].target_id(), "500");
        assert!(results[0].is_success());
    }
}
