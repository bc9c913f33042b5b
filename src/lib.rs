//! circq - Resizable bounded circular byte queue
//!
//! Arsitektur:
//! - Queue Store: storage tetap + head/tail/count (`core`)
//! - Concurrency Guard: satu Mutex + Condvar, dequeue blocking (`core`)
//! - Control Interface: CONFIGURE / ENQUEUE / DEQUEUE dengan validasi (`control`)
//! - Binary Protocol + TCP service sebagai pengganti device node (`protocol`, `network`)
//!
//! ```
//! use circq::core::ByteQueue;
//!
//! let queue = ByteQueue::new();
//! queue.configure(5).unwrap();
//! queue.enqueue(&[1, 2, 3]).unwrap();
//! assert_eq!(queue.dequeue(3).unwrap(), vec![1, 2, 3]);
//! ```

pub mod control;
pub mod core;
pub mod error;
pub mod network;
pub mod protocol;
pub mod trace;

pub use crate::control::{Command, QueueService, Reply};
pub use crate::core::{ByteQueue, Cancellation, Snapshot};
pub use crate::error::{ClientError, QueueError};
