//! Test doubles for the invocation engine
//!
//! - [`MockVista`]: an in-process TCP server that speaks the wire protocol, so the
//!   real authenticator and invoker can be exercised without a remote host.
//! - [`MockInvokerFactory`]: an in-memory [`RpcInvokerFactory`] with scripted
//!   per-target outcomes and counters for created and closed invokers.

use crate::wire::{
    read_frame, write_frame, ClientMessage, ExecuteRequest, ServerMessage, DEFAULT_MAX_FRAME_LEN,
};
use charon_api::{
    AuthenticationError, Credential, ErrorDescriptor, ErrorKind, RpcDetails, RpcInvocationResult,
    RpcInvoker, RpcInvokerFactory, RpcValue, TargetDescriptor,
};
use secrecy::ExposeSecret;
use std::collections::HashMap;
use std::io::{self, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

// ═══════════════════════════════════════════════════════════════════════
// MockVista: wire-level server
// ═══════════════════════════════════════════════════════════════════════

/// How [`MockVista`] answers one procedure
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Reply with `rpc_result`
    Value {
        response_type: String,
        payload: String,
    },
    /// Reply with `fault`
    Fault { code: String, message: String },
    /// Reply with a single value echoing the first parameter
    Echo,
    /// Sleep before answering, so the caller's RPC bound elapses
    Stall(Duration),
    /// Answer with a single value, writing the frame one byte per interval
    Trickle(Duration),
    /// Reply with a frame whose body is not valid JSON
    Garbage,
}

impl MockReply {
    pub fn single(payload: impl Into<String>) -> Self {
        MockReply::Value {
            response_type: "single value".to_string(),
            payload: payload.into(),
        }
    }

    pub fn array<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lines: Vec<String> = lines.into_iter().map(Into::into).collect();
        MockReply::Value {
            response_type: "array".to_string(),
            payload: lines.join("\r\n"),
        }
    }

    pub fn fault(code: impl Into<String>, message: impl Into<String>) -> Self {
        MockReply::Fault {
            code: code.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
struct MockVistaConfig {
    access_code: String,
    verify_code: String,
    login_delay: Option<Duration>,
    login_trickle: Option<Duration>,
    replies: HashMap<String, MockReply>,
}

/// Builder for [`MockVista`]
#[derive(Debug, Clone)]
pub struct MockVistaBuilder {
    config: MockVistaConfig,
}

impl MockVistaBuilder {
    /// Accept only this access/verify code pair
    pub fn credential(mut self, access_code: &str, verify_code: &str) -> Self {
        self.config.access_code = access_code.to_string();
        self.config.verify_code = verify_code.to_string();
        self
    }

    /// Wait this long before answering a login
    pub fn login_delay(mut self, delay: Duration) -> Self {
        self.config.login_delay = Some(delay);
        self
    }

    /// Write the login reply one byte per `interval`
    pub fn login_trickle(mut self, interval: Duration) -> Self {
        self.config.login_trickle = Some(interval);
        self
    }

    /// Answer the named procedure with `reply`
    pub fn rpc(mut self, name: &str, reply: MockReply) -> Self {
        self.config.replies.insert(name.to_string(), reply);
        self
    }

    /// Bind to an ephemeral port on 127.0.0.1 and start serving
    pub fn spawn(self) -> io::Result<MockVista> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        let stats = Arc::new(MockStats::default());
        let shutdown = Arc::new(AtomicBool::new(false));

        let config = Arc::new(self.config);
        let accept_stats = stats.clone();
        let accept_shutdown = shutdown.clone();
        let handle = thread::Builder::new()
            .name(format!("mock-vista-{}", addr.port()))
            .spawn(move || {
                for stream in listener.incoming() {
                    if accept_shutdown.load(Ordering::SeqCst) {
                        break;
                    }
                    let Ok(stream) = stream else { continue };
                    let config = config.clone();
                    let stats = accept_stats.clone();
                    thread::spawn(move || serve_connection(stream, &config, &stats));
                }
            })?;

        Ok(MockVista {
            addr,
            stats,
            shutdown,
            handle: Some(handle),
        })
    }
}

#[derive(Debug, Default)]
struct MockStats {
    logins: AtomicUsize,
    rejected_logins: AtomicUsize,
    logouts: AtomicUsize,
    executed: Mutex<Vec<ExecuteRequest>>,
}

/// In-process target host for tests
///
/// # Example
///
/// ```
/// use charon_api::{Credential, RpcDetails, RpcInvoker};
/// use charon_connect::mock::{MockReply, MockVista};
/// use charon_connect::{InvokerSettings, VistalinkRpcInvoker};
///
/// let vista = MockVista::builder()
///     .credential("ac", "vc")
///     .rpc("XOBV TEST PING", MockReply::single("1"))
///     .spawn()
///     .unwrap();
///
/// let mut invoker = VistalinkRpcInvoker::connect(
///     &Credential::new("ac", "vc"),
///     &vista.target("500"),
///     &InvokerSettings::default(),
/// )
/// .unwrap();
///
/// let ping = RpcDetails::builder()
///     .name("XOBV TEST PING")
///     .context("XOBV VISTALINK TESTER")
///     .build()
///     .unwrap();
/// assert!(invoker.invoke(&ping).is_success());
/// invoker.close();
/// ```
#[derive(Debug)]
pub struct MockVista {
    addr: SocketAddr,
    stats: Arc<MockStats>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MockVista {
    pub fn builder() -> MockVistaBuilder {
        MockVistaBuilder {
            config: MockVistaConfig {
                access_code: "ACCESS".to_string(),
                verify_code: "VERIFY".to_string(),
                login_delay: None,
                login_trickle: None,
                replies: HashMap::new(),
            },
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Descriptor for a logical target served by this host
    pub fn target(&self, target_id: &str) -> TargetDescriptor {
        TargetDescriptor::new(target_id, "127.0.0.1", self.addr.port(), "605")
    }

    pub fn logins(&self) -> usize {
        self.stats.logins.load(Ordering::SeqCst)
    }

    pub fn rejected_logins(&self) -> usize {
        self.stats.rejected_logins.load(Ordering::SeqCst)
    }

    pub fn logouts(&self) -> usize {
        self.stats.logouts.load(Ordering::SeqCst)
    }

    /// Every `execute` received so far, in arrival order
    pub fn executed(&self) -> Vec<ExecuteRequest> {
        self.stats
            .executed
            .lock()
            .map(|executed| executed.clone())
            .unwrap_or_default()
    }

    /// Poll until `logouts()` reaches `count` or `timeout` elapses
    pub fn wait_for_logouts(&self, count: usize, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        while std::time::Instant::now() < deadline {
            if self.logouts() >= count {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        self.logouts() >= count
    }
}

impl Drop for MockVista {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        // Wake the accept loop so it sees the flag.
        let _ = TcpStream::connect(self.addr);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Write `message` as one frame, one byte at a time
fn write_trickled(stream: &mut TcpStream, message: &ServerMessage, interval: Duration) -> bool {
    let mut frame = Vec::new();
    if write_frame(&mut frame, message, DEFAULT_MAX_FRAME_LEN).is_err() {
        return false;
    }
    for byte in frame {
        if stream.write_all(&[byte]).is_err() {
            return false;
        }
        thread::sleep(interval);
    }
    true
}

fn serve_connection(mut stream: TcpStream, config: &MockVistaConfig, stats: &MockStats) {
    let mut authenticated = false;

    loop {
        let message: ClientMessage = match read_frame(&mut stream, DEFAULT_MAX_FRAME_LEN) {
            Ok(message) => message,
            Err(e) => {
                debug!("Mock vista connection ended: {}", e);
                return;
            }
        };

        let reply = match message {
            ClientMessage::Login {
                access_code,
                verify_code,
                ..
            } => {
                if let Some(delay) = config.login_delay {
                    thread::sleep(delay);
                }
                if access_code == config.access_code && verify_code == config.verify_code {
                    let n = stats.logins.fetch_add(1, Ordering::SeqCst) + 1;
                    authenticated = true;
                    let accepted = ServerMessage::LoginAccepted {
                        session: format!("mock-session-{}", n),
                    };
                    match config.login_trickle {
                        Some(interval) => {
                            if !write_trickled(&mut stream, &accepted, interval) {
                                return;
                            }
                            continue;
                        }
                        None => accepted,
                    }
                } else {
                    stats.rejected_logins.fetch_add(1, Ordering::SeqCst);
                    ServerMessage::LoginRejected {
                        reason: "Not a valid ACCESS CODE/VERIFY CODE pair.".to_string(),
                    }
                }
            }
            ClientMessage::Execute(request) => {
                if let Ok(mut executed) = stats.executed.lock() {
                    executed.push(request.clone());
                }
                if !authenticated {
                    ServerMessage::Fault {
                        code: "SECURITY".to_string(),
                        message: "Not logged in.".to_string(),
                    }
                } else {
                    match config.replies.get(&request.name) {
                        None => ServerMessage::Fault {
                            code: "RPC_NOT_FOUND".to_string(),
                            message: format!(
                                "Remote procedure '{}' doesn't exist on the server.",
                                request.name
                            ),
                        },
                        Some(MockReply::Value {
                            response_type,
                            payload,
                        }) => ServerMessage::RpcResult {
                            response_type: response_type.clone(),
                            payload: payload.clone(),
                        },
                        Some(MockReply::Fault { code, message }) => ServerMessage::Fault {
                            code: code.clone(),
                            message: message.clone(),
                        },
                        Some(MockReply::Echo) => ServerMessage::RpcResult {
                            response_type: "single value".to_string(),
                            payload: request
                                .params
                                .first()
                                .and_then(|p| p.value.as_str())
                                .unwrap_or_default()
                                .to_string(),
                        },
                        Some(MockReply::Stall(delay)) => {
                            thread::sleep(*delay);
                            ServerMessage::RpcResult {
                                response_type: "single value".to_string(),
                                payload: "late".to_string(),
                            }
                        }
                        Some(MockReply::Trickle(interval)) => {
                            let reply = ServerMessage::RpcResult {
                                response_type: "single value".to_string(),
                                payload: "slow".to_string(),
                            };
                            if !write_trickled(&mut stream, &reply, *interval) {
                                return;
                            }
                            continue;
                        }
                        Some(MockReply::Garbage) => {
                            let mut frame = 5u32.to_be_bytes().to_vec();
                            frame.extend_from_slice(b"<xml>");
                            if stream.write_all(&frame).is_err() {
                                return;
                            }
                            continue;
                        }
                    }
                }
            }
            ClientMessage::Logout => {
                stats.logouts.fetch_add(1, Ordering::SeqCst);
                let _ = write_frame(
                    &mut stream,
                    &ServerMessage::LogoutAck,
                    DEFAULT_MAX_FRAME_LEN,
                );
                return;
            }
        };

        if write_frame(&mut stream, &reply, DEFAULT_MAX_FRAME_LEN).is_err() {
            return;
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// MockInvokerFactory: in-memory invokers
// ═══════════════════════════════════════════════════════════════════════

/// Scripted behaviour for one target
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Succeed with this value
    Respond(RpcValue),
    /// Succeed, but tag the result with a different target id
    RespondAs(String, RpcValue),
    /// Fail the invocation with this descriptor
    Fail(ErrorDescriptor),
    /// Refuse the login with this reason
    RejectLogin(String),
    /// Panic inside `invoke`
    Panic(String),
}

/// In-memory [`RpcInvokerFactory`]
///
/// Targets without a scripted outcome fail to connect with a network error.
/// Clones share their counters.
#[derive(Debug, Clone, Default)]
pub struct MockInvokerFactory {
    outcomes: HashMap<String, MockOutcome>,
    created: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    invocations: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockInvokerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target(mut self, target_id: impl Into<String>, outcome: MockOutcome) -> Self {
        self.outcomes.insert(target_id.into(), outcome);
        self
    }

    /// Invokers successfully created so far
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Invokers closed so far (each counted once)
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// `(target_id, rpc name)` for every invocation so far
    pub fn invocations(&self) -> Vec<(String, String)> {
        self.invocations
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

impl RpcInvokerFactory for MockInvokerFactory {
    fn create(
        &self,
        credential: &Credential,
        target: &TargetDescriptor,
    ) -> Result<Box<dyn RpcInvoker>, AuthenticationError> {
        let target_id = target.target_id.clone();

        if credential.access_code().expose_secret().is_empty() {
            return Err(AuthenticationError::InvalidCredential { target: target_id });
        }

        let outcome = match self.outcomes.get(&target_id) {
            Some(MockOutcome::RejectLogin(reason)) => {
                return Err(AuthenticationError::Rejected {
                    target: target_id,
                    reason: reason.clone(),
                })
            }
            Some(outcome) => outcome.clone(),
            None => {
                return Err(AuthenticationError::Network {
                    target: target_id,
                    source: io::Error::from(io::ErrorKind::ConnectionRefused),
                })
            }
        };

        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockInvoker {
            target_id,
            outcome,
            closed: false,
            closed_counter: self.closed.clone(),
            invocations: self.invocations.clone(),
        }))
    }
}

struct MockInvoker {
    target_id: String,
    outcome: MockOutcome,
    closed: bool,
    closed_counter: Arc<AtomicUsize>,
    invocations: Arc<Mutex<Vec<(String, String)>>>,
}

impl RpcInvoker for MockInvoker {
    fn invoke(&mut self, details: &RpcDetails) -> RpcInvocationResult {
        if let Ok(mut calls) = self.invocations.lock() {
            calls.push((self.target_id.clone(), details.name().to_string()));
        }

        match &self.outcome {
            MockOutcome::Respond(value) => {
                RpcInvocationResult::success(self.target_id.clone(), value.clone())
            }
            MockOutcome::RespondAs(other_id, value) => {
                RpcInvocationResult::success(other_id.clone(), value.clone())
            }
            MockOutcome::Fail(error) => {
                RpcInvocationResult::failure(self.target_id.clone(), error.clone())
            }
            MockOutcome::Panic(message) => panic!("{}", message),
            MockOutcome::RejectLogin(reason) => RpcInvocationResult::failure(
                self.target_id.clone(),
                ErrorDescriptor::new(ErrorKind::Authentication, reason.clone()),
            ),
        }
    }

    fn target_id(&self) -> &str {
        &self.target_id
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.closed_counter.fetch_add(1, Ordering::SeqCst);
        }
    }
}
