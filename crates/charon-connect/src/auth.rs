//! Credential handshake and session lifecycle for one target

use crate::error::FrameError;
use crate::wire::{
    read_frame, write_frame, ClientMessage, DeadlineStream, ServerMessage, DEFAULT_MAX_FRAME_LEN,
};
use charon_api::{AuthenticationError, Credential, TargetDescriptor};
use secrecy::ExposeSecret;
use std::borrow::Cow;
use std::io;
use std::net::{IpAddr, Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Socket options reject a zero timeout, so every bound is at least this long
const MIN_TIMEOUT: Duration = Duration::from_millis(1);

/// How the authenticator reaches and logs in to a target
///
/// This is passed explicitly to [`ConnectionAuthenticator`]; there is no
/// process-wide login configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Bound on resolving the host and establishing the TCP connection
    pub connect_timeout: Duration,

    /// Bound on the whole login exchange once connected
    pub handshake_timeout: Duration,

    /// Bound on the logout exchange during teardown
    pub logout_timeout: Duration,

    /// Client identifier sent with the login
    pub client_name: String,

    /// Largest frame accepted from the target
    pub max_frame_len: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(30),
            logout_timeout: Duration::from_secs(5),
            client_name: format!("charon/{}", env!("CARGO_PKG_VERSION")),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl AuthConfig {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_logout_timeout(mut self, timeout: Duration) -> Self {
        self.logout_timeout = timeout;
        self
    }

    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    pub fn with_max_frame_len(mut self, len: usize) -> Self {
        self.max_frame_len = len;
        self
    }
}

/// Performs the credential handshake that opens a [`Session`]
///
/// # Example
///
/// ```no_run
/// use charon_api::{Credential, TargetDescriptor};
/// use charon_connect::{AuthConfig, ConnectionAuthenticator};
///
/// let authenticator = ConnectionAuthenticator::new(AuthConfig::default());
/// let target = TargetDescriptor::new("500", "vista.example.org", 18500, "605");
/// let mut session = authenticator.login(&Credential::new("ac", "vc"), &target)?;
/// session.close();
/// # Ok::<(), charon_api::AuthenticationError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConnectionAuthenticator {
    config: AuthConfig,
}

impl ConnectionAuthenticator {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Connect to `target` and log in with `credential`
    ///
    /// Blocks for at most `connect_timeout` + `handshake_timeout`.
    ///
    /// # Errors
    ///
    /// - `InvalidCredential` if either code is blank
    /// - `InvalidTarget` if the host is blank, the port is 0 or the host does not resolve
    /// - `Network` if the connection is refused, reset or unreachable
    /// - `Timeout` if connecting or the login exchange exceeds its bound
    /// - `Rejected` if the target refuses the credential
    /// - `Protocol` if the target answers with anything but a login reply
    pub fn login(
        &self,
        credential: &Credential,
        target: &TargetDescriptor,
    ) -> Result<Session, AuthenticationError> {
        let target_id = target.target_id.clone();

        if !credential.is_complete() {
            return Err(AuthenticationError::InvalidCredential { target: target_id });
        }

        let stream = self.connect(target)?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY for {}: {}", target_id, e);
        }

        let login = ClientMessage::Login {
            access_code: Cow::Borrowed(credential.access_code().expose_secret()),
            verify_code: Cow::Borrowed(credential.verify_code().expose_secret()),
            division: Cow::Borrowed(target.division_id.as_str()),
            client: Cow::Borrowed(self.config.client_name.as_str()),
        };

        debug!(
            "Sending login to {} (division {})",
            target_id, target.division_id
        );

        let handshake_timeout = self.config.handshake_timeout.max(MIN_TIMEOUT);
        let mut channel = DeadlineStream::new(&stream, handshake_timeout);
        let reply = write_frame(&mut channel, &login, self.config.max_frame_len)
            .and_then(|_| read_frame::<_, ServerMessage>(&mut channel, self.config.max_frame_len))
            .map_err(|e| handshake_error(&target_id, e, handshake_timeout))?;

        match reply {
            ServerMessage::LoginAccepted { session } => {
                info!(
                    "Logged in to {} at {} (session: {})",
                    target_id,
                    target.address(),
                    session
                );
                Ok(Session {
                    target_id,
                    session_id: session,
                    stream: Some(stream),
                    max_frame_len: self.config.max_frame_len,
                    logout_timeout: self.config.logout_timeout.max(MIN_TIMEOUT),
                })
            }
            ServerMessage::LoginRejected { reason } => {
                let _ = stream.shutdown(Shutdown::Both);
                Err(AuthenticationError::Rejected {
                    target: target_id,
                    reason,
                })
            }
            other => {
                let _ = stream.shutdown(Shutdown::Both);
                Err(AuthenticationError::Protocol {
                    target: target_id,
                    message: format!("expected a login reply, got {}", other.kind()),
                })
            }
        }
    }

    fn connect(&self, target: &TargetDescriptor) -> Result<TcpStream, AuthenticationError> {
        let target_id = &target.target_id;

        if target.host.trim().is_empty() {
            return Err(AuthenticationError::InvalidTarget {
                target: target_id.clone(),
                reason: "host is empty".to_string(),
            });
        }
        if target.port == 0 {
            return Err(AuthenticationError::InvalidTarget {
                target: target_id.clone(),
                reason: "port 0 is not a valid port".to_string(),
            });
        }

        let connect_timeout = self.config.connect_timeout.max(MIN_TIMEOUT);
        let deadline = Instant::now().checked_add(connect_timeout);
        let timed_out = || AuthenticationError::Timeout {
            target: target_id.clone(),
            after: connect_timeout,
        };

        let addrs = resolve(target, connect_timeout)?;
        let mut last_error = None;
        for addr in &addrs {
            let remaining = deadline.map_or(connect_timeout, |deadline| {
                deadline.saturating_duration_since(Instant::now())
            });
            if remaining < MIN_TIMEOUT {
                return Err(timed_out());
            }
            debug!("Connecting to {} at {}", target_id, addr);
            match TcpStream::connect_timeout(addr, remaining) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_error = Some(e),
            }
        }

        let error = last_error
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no address tried"));
        if matches!(
            error.kind(),
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
        ) {
            Err(timed_out())
        } else {
            Err(AuthenticationError::Network {
                target: target_id.clone(),
                source: error,
            })
        }
    }
}

/// Resolve the target's host, giving up after `timeout`
///
/// Literal addresses skip the resolver. Name lookups run on a helper thread
/// whose answer is discarded if it arrives after the bound.
fn resolve(
    target: &TargetDescriptor,
    timeout: Duration,
) -> Result<Vec<SocketAddr>, AuthenticationError> {
    let target_id = &target.target_id;
    let host = target.host.trim();

    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(vec![SocketAddr::new(ip, target.port)]);
    }

    let (tx, rx) = mpsc::channel();
    let lookup = (host.to_string(), target.port);
    thread::Builder::new()
        .name(format!("resolve-{}", target_id))
        .spawn(move || {
            let _ = tx.send(
                lookup
                    .to_socket_addrs()
                    .map(|addrs| addrs.collect::<Vec<_>>()),
            );
        })
        .map_err(|source| AuthenticationError::Network {
            target: target_id.clone(),
            source,
        })?;

    let addrs = match rx.recv_timeout(timeout) {
        Ok(Ok(addrs)) => addrs,
        Ok(Err(e)) => {
            return Err(AuthenticationError::InvalidTarget {
                target: target_id.clone(),
                reason: format!("cannot resolve {}: {}", target.address(), e),
            })
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            return Err(AuthenticationError::Timeout {
                target: target_id.clone(),
                after: timeout,
            })
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            return Err(AuthenticationError::InvalidTarget {
                target: target_id.clone(),
                reason: format!("lookup of {} stopped without an answer", target.address()),
            })
        }
    };

    if addrs.is_empty() {
        return Err(AuthenticationError::InvalidTarget {
            target: target_id.clone(),
            reason: format!("{} resolved to no addresses", target.address()),
        });
    }
    Ok(addrs)
}

fn handshake_error(target_id: &str, error: FrameError, after: Duration) -> AuthenticationError {
    if error.is_timeout() {
        return AuthenticationError::Timeout {
            target: target_id.to_string(),
            after,
        };
    }
    match error {
        FrameError::Io(source) => AuthenticationError::Network {
            target: target_id.to_string(),
            source,
        },
        FrameError::Closed => AuthenticationError::Network {
            target: target_id.to_string(),
            source: io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed during login",
            ),
        },
        other => AuthenticationError::Protocol {
            target: target_id.to_string(),
            message: other.to_string(),
        },
    }
}

/// An authenticated connection to one target
///
/// Owned by exactly one invoker and never shared. Dropping the session logs out,
/// so release happens on every exit path.
pub struct Session {
    target_id: String,
    session_id: String,
    stream: Option<TcpStream>,
    max_frame_len: usize,
    logout_timeout: Duration,
}

impl Session {
    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Send one message and read the reply, both within `timeout` in total
    pub fn exchange(
        &mut self,
        message: &ClientMessage<'_>,
        timeout: Duration,
    ) -> Result<ServerMessage, FrameError> {
        let stream = self.stream.as_ref().ok_or(FrameError::Closed)?;
        let mut channel = DeadlineStream::new(stream, timeout.max(MIN_TIMEOUT));
        debug!("Sending {} to {}", message.kind(), self.target_id);
        write_frame(&mut channel, message, self.max_frame_len)?;
        read_frame(&mut channel, self.max_frame_len)
    }

    /// Drop the connection without logging out
    ///
    /// Used once the stream is in an unknown state, e.g. after a timed-out read.
    pub fn abandon(&mut self) {
        if let Some(stream) = self.stream.take() {
            warn!(
                "Abandoning session {} with {} without logout",
                self.session_id, self.target_id
            );
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    /// Log out and release the connection
    ///
    /// Best-effort: a failed logout is logged and otherwise ignored, since the
    /// remote host reclaims the session on its own timeout. Idempotent.
    pub fn close(&mut self) {
        let Some(stream) = self.stream.take() else {
            return;
        };

        let mut channel = DeadlineStream::new(&stream, self.logout_timeout);
        let logout = write_frame(&mut channel, &ClientMessage::Logout, self.max_frame_len)
            .and_then(|_| read_frame::<_, ServerMessage>(&mut channel, self.max_frame_len));

        match logout {
            Ok(ServerMessage::LogoutAck) => {
                info!(
                    "Logged out of {} (session: {})",
                    self.target_id, self.session_id
                )
            }
            Ok(other) => warn!(
                "Failed to logout of {}: unexpected {} reply",
                self.target_id,
                other.kind()
            ),
            Err(e) => warn!("Failed to logout of {}: {}", self.target_id, e),
        }

        let _ = stream.shutdown(Shutdown::Both);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("target_id", &self.target_id)
            .field("session_id", &self.session_id)
            .field("open", &self.is_open())
            .finish()
    }
}
