//! Wire protocol spoken with a target host
//!
//! Every message is one frame: a 4-byte big-endian body length followed by a
//! UTF-8 JSON body. Messages are tagged by their `"type"` field.
//!
//! ```text
//! client                              target
//!   | -- login {access, verify, div} -->  |
//!   | <-- login_accepted {session} -----  |   (or login_rejected {reason})
//!   | -- execute {name, ctx, params} -->  |
//!   | <-- rpc_result {type, payload} ---  |   (or fault {code, message})
//!   | -- logout ----------------------->  |
//!   | <-- logout_ack ------------------   |
//! ```

use crate::error::FrameError;
use charon_api::{Parameter, RpcDetails};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

/// Largest frame body accepted in either direction unless configured otherwise
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Messages sent by the gateway
///
/// The gateway builds `Login` over borrowed codes so no owned copy of a secret
/// outlives the frame write. Decoding always yields owned data.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage<'a> {
    Login {
        access_code: Cow<'a, str>,
        verify_code: Cow<'a, str>,
        division: Cow<'a, str>,
        client: Cow<'a, str>,
    },
    Execute(ExecuteRequest),
    Logout,
}

impl ClientMessage<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Login { .. } => "login",
            ClientMessage::Execute(_) => "execute",
            ClientMessage::Logout => "logout",
        }
    }
}

// Hand-written so access and verify codes never reach a log line.
impl fmt::Debug for ClientMessage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientMessage::Login {
                division, client, ..
            } => f
                .debug_struct("Login")
                .field("access_code", &"[REDACTED]")
                .field("verify_code", &"[REDACTED]")
                .field("division", division)
                .field("client", client)
                .finish(),
            ClientMessage::Execute(request) => f.debug_tuple("Execute").field(request).finish(),
            ClientMessage::Logout => f.write_str("Logout"),
        }
    }
}

/// Transport-level form of one RPC call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub name: String,
    pub context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub proprietary_format: bool,
    pub params: Vec<WireParam>,
}

impl ExecuteRequest {
    /// Assign each parameter to its 1-based slot, in order
    pub fn from_details(details: &RpcDetails) -> Self {
        Self {
            name: details.name().to_string(),
            context: details.context().to_string(),
            version: details.version().map(str::to_string),
            proprietary_format: true,
            params: details
                .positional_parameters()
                .map(|(position, parameter)| WireParam::new(position, parameter))
                .collect(),
        }
    }
}

/// One positional parameter on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireParam {
    pub position: u32,
    #[serde(rename = "type")]
    pub param_type: String,
    pub value: serde_json::Value,
}

impl WireParam {
    pub fn new(position: u32, parameter: &Parameter) -> Self {
        let value = match parameter {
            Parameter::String(value) | Parameter::Ref(value) => {
                serde_json::Value::String(value.clone())
            }
            Parameter::Array(values) => serde_json::Value::Object(
                (1..)
                    .zip(values)
                    .map(|(i, v): (usize, &String)| {
                        (i.to_string(), serde_json::Value::String(v.clone()))
                    })
                    .collect(),
            ),
            Parameter::NamedArray(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                    .collect(),
            ),
        };

        Self {
            position,
            param_type: parameter.remote_type().to_string(),
            value,
        }
    }
}

/// Messages sent by a target host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    LoginAccepted { session: String },
    LoginRejected { reason: String },
    RpcResult { response_type: String, payload: String },
    Fault { code: String, message: String },
    LogoutAck,
}

impl ServerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::LoginAccepted { .. } => "login_accepted",
            ServerMessage::LoginRejected { .. } => "login_rejected",
            ServerMessage::RpcResult { .. } => "rpc_result",
            ServerMessage::Fault { .. } => "fault",
            ServerMessage::LogoutAck => "logout_ack",
        }
    }
}

/// Serialize `message` and write it as one frame
pub fn write_frame<W, T>(writer: &mut W, message: &T, max_len: usize) -> Result<(), FrameError>
where
    W: Write,
    T: Serialize,
{
    let body = serde_json::to_vec(message).map_err(FrameError::Encode)?;
    if body.len() > max_len {
        return Err(FrameError::TooLarge {
            len: body.len(),
            max: max_len,
        });
    }
    let len = u32::try_from(body.len()).map_err(|_| FrameError::TooLarge {
        len: body.len(),
        max: u32::MAX as usize,
    })?;

    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&body);
    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}

/// A borrowed stream whose reads and writes all share one deadline
///
/// Each call re-arms the socket timeout with whatever is left of the budget, so
/// a peer trickling bytes cannot stretch an exchange past its bound. Once the
/// deadline passes every call fails with `TimedOut`.
#[derive(Debug)]
pub struct DeadlineStream<'a> {
    stream: &'a TcpStream,
    deadline: Option<Instant>,
}

impl<'a> DeadlineStream<'a> {
    pub fn new(stream: &'a TcpStream, budget: Duration) -> Self {
        Self {
            stream,
            deadline: Instant::now().checked_add(budget),
        }
    }

    /// Time left before the deadline; `None` when the budget is unbounded
    fn remaining(&self) -> io::Result<Option<Duration>> {
        let Some(deadline) = self.deadline else {
            return Ok(None);
        };
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "deadline elapsed"));
        }
        Ok(Some(remaining))
    }
}

impl Read for DeadlineStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.set_read_timeout(self.remaining()?)?;
        let mut stream = self.stream;
        stream.read(buf)
    }
}

impl Write for DeadlineStream<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.set_write_timeout(self.remaining()?)?;
        let mut stream = self.stream;
        stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut stream = self.stream;
        stream.flush()
    }
}

/// Read one frame and deserialize its body
pub fn read_frame<R, T>(reader: &mut R, max_len: usize) -> Result<T, FrameError>
where
    R: Read,
    T: DeserializeOwned,
{
    let mut header = [0u8; 4];
    match reader.read_exact(&mut header) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Err(FrameError::Closed),
        Err(e) => return Err(FrameError::Io(e)),
    }

    let len = u32::from_be_bytes(header) as usize;
    if len > max_len {
        return Err(FrameError::TooLarge { len, max: max_len });
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;
    serde_json::from_slice(&body).map_err(FrameError::Decode)
}
