//! Charon API: the generic RPC contract
//!
//! This crate defines the values that cross the boundary between the type-safe
//! mapping layer and the invocation engine, plus the `RpcInvoker` capability that
//! engine is built on.
//!
//! # Architecture
//!
//! - **RpcDetails / Parameter**: a named procedure with ordered, typed parameters
//! - **RpcInvocationResult**: one target's outcome, success xor failure
//! - **RpcInvoker / RpcInvokerFactory**: the seam real backends and test doubles plug into
//!
//! New procedures are added on top of `RpcDetails` in, `RpcInvocationResult` out,
//! without touching the invocation engine.

pub mod details;
pub mod envelope;
pub mod error;
pub mod principal;
pub mod result;

pub use details::{Parameter, RpcDetails, RpcDetailsBuilder};
pub use envelope::{RpcRequest, RpcResponse, RpcResponseStatus, RpcTarget};
pub use error::{AuthenticationError, DetailsError, InvocationShapeError};
pub use principal::{Credential, TargetDescriptor};
pub use result::{ErrorDescriptor, ErrorKind, RpcInvocationResult, RpcValue};

/// Executes RPCs over one authenticated session bound to one target
///
/// Implementations never panic or return errors for remote failures; every
/// outcome is reported as an [`RpcInvocationResult`] tagged with
/// [`target_id`](RpcInvoker::target_id).
///
/// An invoker owns its session exclusively. Calls are sequential (`&mut self`).
pub trait RpcInvoker: Send {
    /// Run one RPC and report its outcome for the bound target
    fn invoke(&mut self, details: &RpcDetails) -> RpcInvocationResult;

    /// Logical id of the bound target
    fn target_id(&self) -> &str;

    /// Release the session. Calling this more than once is a no-op.
    fn close(&mut self);
}

/// Builds authenticated invokers
///
/// Creating an invoker performs the credential handshake, so this blocks and may
/// fail with [`AuthenticationError`].
pub trait RpcInvokerFactory: Send + Sync {
    fn create(
        &self,
        credential: &Credential,
        target: &TargetDescriptor,
    ) -> Result<Box<dyn RpcInvoker>, AuthenticationError>;
}

impl<F: RpcInvokerFactory + ?Sized> RpcInvokerFactory for std::sync::Arc<F> {
    fn create(
        &self,
        credential: &Credential,
        target: &TargetDescriptor,
    ) -> Result<Box<dyn RpcInvoker>, AuthenticationError> {
        (**self).create(credential, target)
    }
}
