//! Error types for the charon-connect crate

use std::io;
use thiserror::Error;

/// Failure reading or writing one wire frame
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Connection closed by remote host")]
    Closed,

    #[error("Frame of {len} bytes exceeds the {max} byte limit")]
    TooLarge { len: usize, max: usize },

    #[error("Failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode frame: {0}")]
    Decode(#[source] serde_json::Error),
}

impl FrameError {
    /// The socket read or write bound elapsed
    pub fn is_timeout(&self) -> bool {
        match self {
            FrameError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}

/// A remote payload did not match its declared response type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("Unknown response type '{0}'")]
    UnknownResponseType(String),
}

#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("Failed to build dispatch thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
