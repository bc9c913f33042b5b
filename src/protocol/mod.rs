//! Protocol Layer: fixed-header binary framing
//!
//! Prinsip desain:
//! - Fixed-size header: layout predictable, little-endian eksplisit
//! - Satu frame = satu command atau satu reply
//! - Encoder dipakai ulang antar frame

mod encoder;
mod message;

pub use encoder::{Decoder, Encoder};
pub use message::{
    checksum32, FrameHeader, ProtocolError, HEADER_SIZE, MAGIC, MAX_PAYLOAD_SIZE, REPLY_FLAG,
    VERSION,
};
