//! Command set yang bisa dikirim caller
//!
//! Kode opcode sama dengan yang dipakai di wire protocol.

use crate::error::QueueError;

/// Kode command mentah
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Set ukuran queue (buang isi lama)
    Configure = 1,
    /// Push bytes ke tail
    Enqueue = 2,
    /// Pop bytes dari head, blocking
    Dequeue = 3,
}

impl Opcode {
    #[inline(always)]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::Configure),
            2 => Some(Self::Enqueue),
            3 => Some(Self::Dequeue),
            _ => None,
        }
    }
}

/// One external command, consumed once per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Configure { size: i64 },
    /// `length` adalah jumlah byte yang diklaim caller; `data` harus
    /// benar-benar berisi minimal sebanyak itu
    Enqueue { length: i64, data: Vec<u8> },
    Dequeue { length: i64 },
}

impl Command {
    /// Bangun command dari kode mentah + argumen.
    ///
    /// Kode yang tidak dikenal gagal `InvalidCommand`.
    pub fn decode(opcode: u8, argument: i64, payload: Vec<u8>) -> Result<Self, QueueError> {
        match Opcode::from_u8(opcode) {
            Some(Opcode::Configure) => Ok(Self::Configure { size: argument }),
            Some(Opcode::Enqueue) => Ok(Self::Enqueue {
                length: argument,
                data: payload,
            }),
            Some(Opcode::Dequeue) => Ok(Self::Dequeue { length: argument }),
            None => Err(QueueError::InvalidCommand),
        }
    }

    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Configure { .. } => Opcode::Configure,
            Self::Enqueue { .. } => Opcode::Enqueue,
            Self::Dequeue { .. } => Opcode::Dequeue,
        }
    }

    /// Argumen numerik (size atau length)
    pub fn argument(&self) -> i64 {
        match self {
            Self::Configure { size } => *size,
            Self::Enqueue { length, .. } | Self::Dequeue { length } => *length,
        }
    }
}

/// Successful command outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Configure / Enqueue
    Done,
    /// Dequeue: tepat `length` bytes
    Data(Vec<u8>),
}

impl Reply {
    pub fn into_data(self) -> Vec<u8> {
        match self {
            Self::Done => Vec::new(),
            Self::Data(data) => data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_known_opcodes() {
        assert_eq!(
            Command::decode(1, 5, Vec::new()),
            Ok(Command::Configure { size: 5 })
        );
        assert_eq!(
            Command::decode(2, 3, b"xyz".to_vec()),
            Ok(Command::Enqueue {
                length: 3,
                data: b"xyz".to_vec()
            })
        );
        let cmd = Command::decode(3, 7, Vec::new()).unwrap();
        assert_eq!(cmd.opcode(), Opcode::Dequeue);
        assert_eq!(cmd.argument(), 7);
    }

    #[test]
    fn test_decode_unknown_opcode() {
        assert_eq!(
            Command::decode(0, 0, Vec::new()),
            Err(QueueError::InvalidCommand)
        );
        assert_eq!(
            Command::decode(42, 1, Vec::new()),
            Err(QueueError::InvalidCommand)
        );
    }
}
