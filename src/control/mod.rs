//! Control Interface: tiga command eksternal di atas satu queue
//!
//! - CONFIGURE(size)
//! - ENQUEUE(length, data)
//! - DEQUEUE(length), blocking

mod command;
mod service;

pub use command::{Command, Opcode, Reply};
pub use service::{QueueService, ServiceConfig};
