//! Charon Connect: the invocation engine
//!
//! This crate logs in to target hosts, runs RPCs over the resulting sessions and
//! fans a single RPC out across many targets.
//!
//! # Architecture
//!
//! - **ConnectionAuthenticator**: credential handshake that opens a `Session`
//! - **VistalinkRpcInvoker**: `RpcInvoker` over one owned session
//! - **MultiTargetDispatcher**: one invoker per target, run in parallel, results in input order
//! - **mock** (`mock` feature): an in-process target host and an in-memory invoker factory for tests
//!
//! # Example
//!
//! ```rust,no_run
//! use charon_api::{Credential, RpcDetails, TargetDescriptor};
//! use charon_connect::{
//!     InvokerSettings, MultiTargetDispatcher, ResolvedTarget, VistalinkRpcInvokerFactory,
//! };
//!
//! let factory = VistalinkRpcInvokerFactory::new(InvokerSettings::default());
//! let dispatcher = MultiTargetDispatcher::new(factory);
//!
//! let ping = RpcDetails::builder()
//!     .name("XOBV TEST PING")
//!     .context("XOBV VISTALINK TESTER")
//!     .build()?;
//! let targets = vec![
//!     ResolvedTarget::new(
//!         TargetDescriptor::new("500", "vista-a.example.org", 18500, "605"),
//!         Credential::new("ac", "vc"),
//!     ),
//!     ResolvedTarget::new(
//!         TargetDescriptor::new("600", "vista-b.example.org", 18500, "605"),
//!         Credential::new("ac", "vc"),
//!     ),
//! ];
//!
//! let results = dispatcher.dispatch(&ping, &targets);
//! assert_eq!(results.len(), 2);
//! # Ok::<(), charon_api::DetailsError>(())
//! ```

pub mod auth;
pub mod dispatch;
pub mod error;
pub mod invoker;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod wire;

pub use auth::{AuthConfig, ConnectionAuthenticator, Session};
pub use dispatch::{MultiTargetDispatcher, ResolvedTarget};
pub use error::{ConnectError, FrameError, PayloadError};
pub use invoker::{
    parse_payload, InvokerSettings, VistalinkRpcInvoker, VistalinkRpcInvokerFactory,
};
