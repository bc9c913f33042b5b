//! Error taxonomy for queue commands
//!
//! Setiap command gagal dengan tepat satu [`QueueError`]. Kegagalan tidak pernah
//! mengubah head/tail/count, dan lock selalu dilepas sebelum error dikembalikan.

use std::io;

use thiserror::Error;

use crate::protocol::ProtocolError;

/// Caller-visible outcome of a failed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum QueueError {
    /// Configure size <= 0, or a dequeue that can never be satisfied
    #[error("invalid argument")]
    InvalidArgument,
    /// Enqueue/dequeue before any successful configure
    #[error("queue is not configured")]
    FailedPrecondition,
    /// Allocation failure or not enough free space
    #[error("resource exhausted")]
    ResourceExhausted,
    /// Caller buffer does not hold (or cannot accept) the requested bytes
    #[error("bad address")]
    BadAddress,
    /// Unrecognized command code
    #[error("invalid command")]
    InvalidCommand,
    /// Blocking dequeue aborted from outside
    #[error("operation canceled")]
    Canceled,
}

impl QueueError {
    /// Wire status byte. Status 0 is reserved for success.
    #[inline]
    pub const fn status(self) -> u8 {
        match self {
            Self::InvalidArgument => 1,
            Self::FailedPrecondition => 2,
            Self::ResourceExhausted => 3,
            Self::BadAddress => 4,
            Self::InvalidCommand => 5,
            Self::Canceled => 6,
        }
    }

    /// Inverse of [`status`](Self::status). Returns `None` for 0 and unknown codes.
    #[inline]
    pub const fn from_status(status: u8) -> Option<Self> {
        match status {
            1 => Some(Self::InvalidArgument),
            2 => Some(Self::FailedPrecondition),
            3 => Some(Self::ResourceExhausted),
            4 => Some(Self::BadAddress),
            5 => Some(Self::InvalidCommand),
            6 => Some(Self::Canceled),
            _ => None,
        }
    }

    /// Classic character-device errno for this error (positive value).
    #[cfg(unix)]
    pub const fn errno(self) -> i32 {
        match self {
            Self::InvalidArgument | Self::InvalidCommand => libc::EINVAL,
            Self::FailedPrecondition | Self::ResourceExhausted => libc::ENOMEM,
            Self::BadAddress => libc::EFAULT,
            Self::Canceled => libc::ECANCELED,
        }
    }
}

/// Failure while moving frames over a socket
#[derive(Debug, Error)]
pub enum WireError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Anything a remote caller can hit
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Wire(#[from] WireError),
    /// Server menjalankan command dan mengembalikan error queue
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
    #[error("unexpected reply (opcode {opcode:#04x}, sequence {sequence})")]
    UnexpectedReply { opcode: u8, sequence: u64 },
    #[error("unknown status code {0}")]
    UnknownStatus(u8),
    #[error("server closed the connection")]
    Disconnected,
}

impl From<io::Error> for ClientError {
    fn from(err: io::Error) -> Self {
        Self::Wire(WireError::Io(err))
    }
}

impl From<ProtocolError> for ClientError {
    fn from(err: ProtocolError) -> Self {
        Self::Wire(WireError::Protocol(err))
    }
}

impl ClientError {
    /// Error queue dari server, jika ada
    pub fn queue_error(&self) -> Option<QueueError> {
        match self {
            Self::Queue(err) => Some(*err),
            _ => None,
        }
    }
}
