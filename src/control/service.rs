//! Control Interface
//!
//! Validasi input di trust boundary, lalu teruskan ke [`ByteQueue`].
//! Validasi selalu terjadi sebelum queue disentuh, jadi kegagalan di sini
//! tidak pernah mengubah state queue.

use tracing::debug;

use super::command::{Command, Reply};
use crate::core::{ByteQueue, Cancellation, Snapshot};
use crate::error::QueueError;
use crate::protocol::MAX_PAYLOAD_SIZE;

/// Service-level limits
#[derive(Debug, Clone, Copy)]
pub struct ServiceConfig {
    /// Dequeue yang lebih panjang dari ini tidak bisa diterima caller
    pub max_transfer: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_transfer: MAX_PAYLOAD_SIZE,
        }
    }
}

/// Dispatches external commands onto one owned queue.
#[derive(Clone)]
pub struct QueueService {
    queue: ByteQueue,
    config: ServiceConfig,
}

impl QueueService {
    pub fn new(queue: ByteQueue) -> Self {
        Self::with_config(queue, ServiceConfig::default())
    }

    pub fn with_config(queue: ByteQueue, config: ServiceConfig) -> Self {
        Self { queue, config }
    }

    #[inline(always)]
    pub fn queue(&self) -> &ByteQueue {
        &self.queue
    }

    pub fn snapshot(&self) -> Snapshot {
        self.queue.snapshot()
    }

    /// Token pembatalan untuk dequeue di service ini
    pub fn cancellation(&self) -> Cancellation {
        self.queue.cancellation()
    }

    /// Decode kode mentah lalu eksekusi
    pub fn dispatch(
        &self,
        opcode: u8,
        argument: i64,
        payload: Vec<u8>,
        cancel: Option<&Cancellation>,
    ) -> Result<Reply, QueueError> {
        let command = Command::decode(opcode, argument, payload).map_err(|err| {
            debug!(opcode, "unrecognized command");
            err
        })?;
        self.execute(command, cancel)
    }

    pub fn execute(
        &self,
        command: Command,
        cancel: Option<&Cancellation>,
    ) -> Result<Reply, QueueError> {
        match command {
            Command::Configure { size } => self.configure(size).map(|()| Reply::Done),
            Command::Enqueue { length, data } => self.enqueue(length, &data).map(|()| Reply::Done),
            Command::Dequeue { length } => self.dequeue(length, cancel).map(Reply::Data),
        }
    }

    pub fn configure(&self, size: i64) -> Result<(), QueueError> {
        self.queue.configure(size)
    }

    /// Enqueue tepat `length` bytes pertama dari `data`.
    ///
    /// `BadAddress` jika `length` negatif atau `data` lebih pendek dari `length`.
    pub fn enqueue(&self, length: i64, data: &[u8]) -> Result<(), QueueError> {
        let len = usize::try_from(length).map_err(|_| QueueError::BadAddress)?;
        let bytes = data.get(..len).ok_or(QueueError::BadAddress)?;
        self.queue.enqueue(bytes)
    }

    /// Dequeue tepat `length` bytes, blocking sampai tersedia.
    pub fn dequeue(
        &self,
        length: i64,
        cancel: Option<&Cancellation>,
    ) -> Result<Vec<u8>, QueueError> {
        let len = self.transfer_len(length)?;
        match cancel {
            Some(cancel) => self.queue.dequeue_with(len, cancel),
            None => self.queue.dequeue(len),
        }
    }

    /// Dequeue ke buffer milik caller.
    ///
    /// `BadAddress` jika `out` tidak muat `length` bytes. Returns jumlah
    /// bytes yang ditulis (selalu sama dengan `length`).
    pub fn dequeue_into(
        &self,
        length: i64,
        out: &mut [u8],
        cancel: Option<&Cancellation>,
    ) -> Result<usize, QueueError> {
        let len = self.transfer_len(length)?;
        let dst = out.get_mut(..len).ok_or(QueueError::BadAddress)?;
        let bytes = match cancel {
            Some(cancel) => self.queue.dequeue_with(len, cancel)?,
            None => self.queue.dequeue(len)?,
        };
        dst.copy_from_slice(&bytes);
        Ok(len)
    }

    /// Non-blocking dequeue. `Ok(None)` jika harus menunggu.
    pub fn try_dequeue(&self, length: i64) -> Result<Option<Vec<u8>>, QueueError> {
        let len = self.transfer_len(length)?;
        self.queue.try_dequeue(len)
    }

    fn transfer_len(&self, length: i64) -> Result<usize, QueueError> {
        match usize::try_from(length) {
            Ok(len) if len <= self.config.max_transfer => Ok(len),
            _ => Err(QueueError::BadAddress),
        }
    }
}
