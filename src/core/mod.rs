//! Core module: resizable circular byte queue
//!
//! Prinsip desain:
//! - Single guard: satu Mutex untuk semua mutasi, tidak ada locking yang lebih halus
//! - Backpressure: dequeue blocking sampai data cukup, tidak ada short read
//! - All-or-nothing: kegagalan tidak pernah mengubah head/tail/count

mod queue;
mod ring_index;
mod store;

pub use queue::{ByteQueue, Cancellation, QueueConfig};
pub use ring_index::{RingIndex, Segments};
pub use store::{QueueStore, Snapshot, DEFAULT_MAX_CAPACITY};
