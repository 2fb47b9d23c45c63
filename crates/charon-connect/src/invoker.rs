//! RpcInvoker over an authenticated session

use crate::auth::{AuthConfig, ConnectionAuthenticator, Session};
use crate::error::{FrameError, PayloadError};
use crate::wire::{ClientMessage, ExecuteRequest, ServerMessage};
use charon_api::{
    AuthenticationError, Credential, ErrorDescriptor, ErrorKind, RpcDetails,
    RpcInvocationResult, RpcInvoker, RpcInvokerFactory, RpcValue, TargetDescriptor,
};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Connection and call bounds for invokers
#[derive(Debug, Clone)]
pub struct InvokerSettings {
    pub auth: AuthConfig,

    /// Bound on one RPC request/reply exchange
    pub rpc_timeout: Duration,
}

impl Default for InvokerSettings {
    fn default() -> Self {
        Self {
            auth: AuthConfig::default(),
            rpc_timeout: Duration::from_secs(60),
        }
    }
}

impl InvokerSettings {
    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = timeout;
        self
    }
}

/// Parse a raw remote payload according to its declared response type
///
/// Single-value types keep the payload verbatim. Multi-line types are split on
/// `\n`, a trailing `\r` is removed from each line, and one trailing empty line
/// (from a final line terminator) is dropped.
pub fn parse_payload(response_type: &str, payload: &str) -> Result<RpcValue, PayloadError> {
    match response_type.trim().to_ascii_lowercase().as_str() {
        "single value" | "global instance" => Ok(RpcValue::Single(payload.to_string())),
        "array" | "word processing" | "global array" => {
            let mut lines: Vec<String> = payload
                .split('\n')
                .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
                .collect();
            if lines.last().is_some_and(|line| line.is_empty()) {
                lines.pop();
            }
            Ok(RpcValue::Lines(lines))
        }
        other => Err(PayloadError::UnknownResponseType(other.to_string())),
    }
}

/// Invokes RPCs against one target over one authenticated [`Session`]
///
/// Construction performs the login. The session is released by
/// [`close`](RpcInvoker::close) or when the invoker is dropped.
#[derive(Debug)]
pub struct VistalinkRpcInvoker {
    target_id: String,
    session: Session,
    rpc_timeout: Duration,
    broken: bool,
}

impl VistalinkRpcInvoker {
    /// Log in to `target` and bind a new invoker to it
    pub fn connect(
        credential: &Credential,
        target: &TargetDescriptor,
        settings: &InvokerSettings,
    ) -> Result<Self, AuthenticationError> {
        let session =
            ConnectionAuthenticator::new(settings.auth.clone()).login(credential, target)?;
        Ok(Self::from_session(session, settings.rpc_timeout))
    }

    pub fn from_session(session: Session, rpc_timeout: Duration) -> Self {
        Self {
            target_id: session.target_id().to_string(),
            session,
            rpc_timeout,
            broken: false,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn execute(&mut self, details: &RpcDetails) -> Result<RpcValue, ErrorDescriptor> {
        if self.broken {
            return Err(ErrorDescriptor::new(
                ErrorKind::Transport,
                "session is no longer usable after an earlier failure",
            ));
        }
        if !self.session.is_open() {
            return Err(ErrorDescriptor::new(ErrorKind::Transport, "session is closed"));
        }

        let request = ClientMessage::Execute(ExecuteRequest::from_details(details));
        let reply = match self.session.exchange(&request, self.rpc_timeout) {
            Ok(reply) => reply,
            Err(e) => {
                // The stream position is unknown after a failed exchange.
                self.broken = true;
                self.session.abandon();
                return Err(self.frame_failure(e));
            }
        };

        match reply {
            ServerMessage::RpcResult {
                response_type,
                payload,
            } => parse_payload(&response_type, &payload)
                .map_err(|e| ErrorDescriptor::new(ErrorKind::Parse, e.to_string())),
            ServerMessage::Fault { code, message } => Err(ErrorDescriptor::new(
                ErrorKind::Remote,
                format!("{}: {}", code, message),
            )),
            other => {
                self.broken = true;
                Err(ErrorDescriptor::new(
                    ErrorKind::Protocol,
                    format!("expected an RPC reply, got {}", other.kind()),
                ))
            }
        }
    }

    fn frame_failure(&self, error: FrameError) -> ErrorDescriptor {
        if error.is_timeout() {
            return ErrorDescriptor::new(
                ErrorKind::Timeout,
                format!("no reply within {}ms", self.rpc_timeout.as_millis()),
            );
        }
        let kind = match error {
            FrameError::Io(_) | FrameError::Closed => ErrorKind::Transport,
            FrameError::Decode(_) => ErrorKind::Parse,
            FrameError::TooLarge { .. } | FrameError::Encode(_) => ErrorKind::Protocol,
        };
        ErrorDescriptor::new(kind, error.to_string())
    }
}

impl RpcInvoker for VistalinkRpcInvoker {
    fn invoke(&mut self, details: &RpcDetails) -> RpcInvocationResult {
        let start = Instant::now();
        let outcome = self.execute(details);
        let elapsed_ms = start.elapsed().as_millis();

        match outcome {
            Ok(value) => {
                info!(
                    "{} ms for {} on {}",
                    elapsed_ms,
                    details.name(),
                    self.target_id
                );
                RpcInvocationResult::success(self.target_id.clone(), value)
            }
            Err(error) => {
                warn!(
                    "{} ms for {} on {} (failed: {})",
                    elapsed_ms,
                    details.name(),
                    self.target_id,
                    error
                );
                RpcInvocationResult::failure(self.target_id.clone(), error)
            }
        }
    }

    fn target_id(&self) -> &str {
        &self.target_id
    }

    fn close(&mut self) {
        self.session.close();
    }
}

/// Builds [`VistalinkRpcInvoker`]s with shared settings
#[derive(Debug, Clone, Default)]
pub struct VistalinkRpcInvokerFactory {
    settings: InvokerSettings,
}

impl VistalinkRpcInvokerFactory {
    pub fn new(settings: InvokerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &InvokerSettings {
        &self.settings
    }
}

impl RpcInvokerFactory for VistalinkRpcInvokerFactory {
    fn create(
        &self,
        credential: &Credential,
        target: &TargetDescriptor,
    ) -> Result<Box<dyn RpcInvoker>, AuthenticationError> {
        let invoker = VistalinkRpcInvoker::connect(credential, target, &self.settings)?;
        Ok(Box::new(invoker))
    }
}
