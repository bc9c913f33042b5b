//! Frame format untuk command service
//!
//! Layout:
//! ┌─────────────────────────────────────────────────────┐
//! │ FrameHeader (32 bytes, fixed, little-endian)        │
//! ├─────────────────────────────────────────────────────┤
//! │ Payload (variable, max 16MB)                        │
//! └─────────────────────────────────────────────────────┘
//!
//! Request dan reply memakai header yang sama. Reply menyalakan bit
//! [`REPLY_FLAG`] di opcode dan mengulang sequence dari request.

use thiserror::Error;

/// Frame Header - fixed 32 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Magic number untuk validasi (0x51524943 = "CIRQ")
    pub magic: u32,
    /// Versi protokol
    pub version: u8,
    /// Kode command (reply: kode | REPLY_FLAG)
    pub opcode: u8,
    /// 0 = sukses, selain itu [`QueueError::status`](crate::error::QueueError::status)
    pub status: u8,
    /// Flags (reserved untuk future use)
    pub flags: u8,
    /// Sequence number untuk mencocokkan reply dengan request
    pub sequence: u64,
    /// Size (configure) atau length (enqueue/dequeue)
    pub argument: i64,
    /// Panjang payload dalam bytes
    pub payload_len: u32,
    /// Checksum payload, 0 = tidak dicek
    pub checksum: u32,
}

pub const HEADER_SIZE: usize = 32;
pub const MAGIC: u32 = 0x5152_4943; // "CIRQ"
pub const VERSION: u8 = 1;
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024; // 16MB max payload
pub const REPLY_FLAG: u8 = 0x80;

/// Malformed frame on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("bad magic {0:#010x}")]
    BadMagic(u32),
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),
    #[error("payload of {0} bytes exceeds limit")]
    PayloadTooLarge(usize),
    #[error("checksum mismatch (header {expected:#010x}, payload {actual:#010x})")]
    ChecksumMismatch { expected: u32, actual: u32 },
}

impl FrameHeader {
    /// Header request baru. Checksum diisi saat encode.
    #[inline(always)]
    pub fn request(opcode: u8, sequence: u64, argument: i64, payload_len: u32) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            opcode,
            status: 0,
            flags: 0,
            sequence,
            argument,
            payload_len,
            checksum: 0,
        }
    }

    /// Header reply untuk request dengan `opcode` dan `sequence` tertentu
    #[inline(always)]
    pub fn reply(opcode: u8, sequence: u64, status: u8, payload_len: u32) -> Self {
        Self {
            opcode: opcode | REPLY_FLAG,
            status,
            ..Self::request(opcode, sequence, payload_len as i64, payload_len)
        }
    }

    #[inline(always)]
    pub fn is_reply(&self) -> bool {
        self.opcode & REPLY_FLAG != 0
    }

    /// Opcode tanpa bit reply
    #[inline(always)]
    pub fn command_code(&self) -> u8 {
        self.opcode & !REPLY_FLAG
    }

    /// Total frame size (header + payload)
    #[inline(always)]
    pub fn total_size(&self) -> usize {
        HEADER_SIZE + self.payload_len as usize
    }

    /// Tulis header ke `buf[..HEADER_SIZE]`
    ///
    /// # Panics
    /// Panic jika `buf` lebih pendek dari `HEADER_SIZE`
    pub fn write_to(&self, buf: &mut [u8]) {
        let buf = &mut buf[..HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4] = self.version;
        buf[5] = self.opcode;
        buf[6] = self.status;
        buf[7] = self.flags;
        buf[8..16].copy_from_slice(&self.sequence.to_le_bytes());
        buf[16..24].copy_from_slice(&self.argument.to_le_bytes());
        buf[24..28].copy_from_slice(&self.payload_len.to_le_bytes());
        buf[28..32].copy_from_slice(&self.checksum.to_le_bytes());
    }

    /// Parse dan validasi header dari raw bytes.
    ///
    /// Returns `Ok(None)` jika `buf` belum berisi header lengkap.
    pub fn read_from(buf: &[u8]) -> Result<Option<Self>, ProtocolError> {
        let Some(raw) = buf.get(..HEADER_SIZE) else {
            return Ok(None);
        };

        let header = Self {
            magic: u32::from_le_bytes(le_array(&raw[0..4])),
            version: raw[4],
            opcode: raw[5],
            status: raw[6],
            flags: raw[7],
            sequence: u64::from_le_bytes(le_array(&raw[8..16])),
            argument: i64::from_le_bytes(le_array(&raw[16..24])),
            payload_len: u32::from_le_bytes(le_array(&raw[24..28])),
            checksum: u32::from_le_bytes(le_array(&raw[28..32])),
        };

        header.validate()?;
        Ok(Some(header))
    }

    /// Validasi header
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.magic != MAGIC {
            return Err(ProtocolError::BadMagic(self.magic));
        }
        if self.version != VERSION {
            return Err(ProtocolError::UnsupportedVersion(self.version));
        }
        if self.payload_len as usize > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge(self.payload_len as usize));
        }
        Ok(())
    }
}

#[inline(always)]
fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}

/// Adler-style checksum (simple, fast)
#[inline(always)]
pub fn checksum32(data: &[u8]) -> u32 {
    let mut a: u32 = 1;
    let mut b: u32 = 0;

    for &byte in data {
        a = a.wrapping_add(byte as u32);
        b = b.wrapping_add(a);
    }

    (b << 16) | a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = FrameHeader::request(3, 0x0102_0304_0506_0708, -5, 9);
        let mut buf = [0u8; HEADER_SIZE];
        header.write_to(&mut buf);

        assert_eq!(&buf[0..4], b"CIRQ");
        assert_eq!(buf[4], VERSION);
        assert_eq!(buf[5], 3);
        assert_eq!(buf[8], 0x08);
        assert_eq!(&buf[16..24], &(-5i64).to_le_bytes());
        assert_eq!(FrameHeader::read_from(&buf), Ok(Some(header)));
    }

    #[test]
    fn test_partial_header_is_incomplete() {
        let mut buf = [0u8; HEADER_SIZE];
        FrameHeader::request(1, 1, 4, 0).write_to(&mut buf);
        assert_eq!(FrameHeader::read_from(&buf[..HEADER_SIZE - 1]), Ok(None));
    }

    #[test]
    fn test_rejects_garbage() {
        let mut buf = [0u8; HEADER_SIZE];
        FrameHeader::request(1, 1, 4, 0).write_to(&mut buf);

        let mut bad_magic = buf;
        bad_magic[0] = b'X';
        assert!(matches!(
            FrameHeader::read_from(&bad_magic),
            Err(ProtocolError::BadMagic(_))
        ));

        let mut bad_version = buf;
        bad_version[4] = 9;
        assert_eq!(
            FrameHeader::read_from(&bad_version),
            Err(ProtocolError::UnsupportedVersion(9))
        );

        let mut huge = buf;
        huge[24..28].copy_from_slice(&u32::MAX.to_le_bytes());
        assert_eq!(
            FrameHeader::read_from(&huge),
            Err(ProtocolError::PayloadTooLarge(u32::MAX as usize))
        );
    }

    #[test]
    fn test_reply_flag() {
        let reply = FrameHeader::reply(2, 77, 3, 0);
        assert!(reply.is_reply());
        assert_eq!(reply.command_code(), 2);
        assert_eq!(reply.status, 3);
        assert_eq!(reply.sequence, 77);
        assert!(!FrameHeader::request(2, 77, 0, 0).is_reply());
    }
}
