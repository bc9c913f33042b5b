//! Blocking client untuk command server
//!
//! Satu request in-flight per client: kirim frame, tunggu reply dengan
//! sequence yang sama.

use std::net::{TcpStream, ToSocketAddrs};

use super::connection::Connection;
use crate::control::Opcode;
use crate::error::{ClientError, QueueError};

pub struct QueueClient {
    conn: Connection,
    sequence: u64,
}

impl QueueClient {
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)?;
        Ok(Self {
            conn: Connection::new(stream)?,
            sequence: 0,
        })
    }

    /// CONFIGURE(size)
    pub fn configure(&mut self, size: i64) -> Result<(), ClientError> {
        self.call(Opcode::Configure as u8, size, &[]).map(drop)
    }

    /// ENQUEUE seluruh `data`
    pub fn enqueue(&mut self, data: &[u8]) -> Result<(), ClientError> {
        let length = i64::try_from(data.len()).map_err(|_| QueueError::BadAddress)?;
        self.enqueue_raw(length, data)
    }

    /// ENQUEUE dengan `length` eksplisit; server menolak jika `data` lebih pendek
    pub fn enqueue_raw(&mut self, length: i64, data: &[u8]) -> Result<(), ClientError> {
        self.call(Opcode::Enqueue as u8, length, data).map(drop)
    }

    /// DEQUEUE(length), blocking sampai server punya cukup data
    pub fn dequeue(&mut self, length: i64) -> Result<Vec<u8>, ClientError> {
        self.call(Opcode::Dequeue as u8, length, &[])
    }

    /// Kirim opcode mentah (termasuk yang tidak dikenal server)
    pub fn call(
        &mut self,
        opcode: u8,
        argument: i64,
        payload: &[u8],
    ) -> Result<Vec<u8>, ClientError> {
        self.sequence = self.sequence.wrapping_add(1);
        let sequence = self.sequence;

        self.conn.send_request(opcode, sequence, argument, payload)?;

        let reply = self.conn.read_frame()?.ok_or(ClientError::Disconnected)?;
        let header = reply.header;
        if !header.is_reply() || header.sequence != sequence || header.command_code() != opcode {
            return Err(ClientError::UnexpectedReply {
                opcode: header.opcode,
                sequence: header.sequence,
            });
        }

        match header.status {
            0 => Ok(reply.payload),
            status => Err(QueueError::from_status(status)
                .map(ClientError::Queue)
                .unwrap_or(ClientError::UnknownStatus(status))),
        }
    }
}
