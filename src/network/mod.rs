//! Network Layer: TCP command service
//!
//! Pengganti device node: client mengirim CONFIGURE / ENQUEUE / DEQUEUE
//! sebagai frame, server menjalankannya di atas satu queue bersama.
//!
//! Fitur:
//! - Thread per connection (dequeue boleh blocking)
//! - TCP_NODELAY + socket buffer tuning
//! - Disconnect saat dequeue menunggu membatalkan dequeue tersebut

mod client;
mod connection;
mod server;

pub use client::QueueClient;
pub use connection::{set_socket_buffers, Connection, Frame};
pub use server::{Server, ServerConfig, ServerStats, ShutdownHandle};
