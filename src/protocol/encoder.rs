//! Frame Encoder/Decoder
//!
//! Encoder menulis ke buffer internal yang dipakai ulang (reset per frame),
//! jadi hot path tidak alokasi setelah buffer cukup besar. Decoder bekerja
//! incremental di atas slice: frame yang belum lengkap dibiarkan untuk
//! read berikutnya.

use super::message::{checksum32, FrameHeader, ProtocolError, HEADER_SIZE, MAX_PAYLOAD_SIZE};

/// Reusable frame encoder
pub struct Encoder {
    buffer: Vec<u8>,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new(64 * 1024)
    }
}

impl Encoder {
    /// Membuat encoder dengan kapasitas awal tertentu
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Reset encoder untuk reuse
    #[inline(always)]
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Encode satu request frame (append ke buffer)
    pub fn encode_request(
        &mut self,
        opcode: u8,
        sequence: u64,
        argument: i64,
        payload: &[u8],
    ) -> Result<&[u8], ProtocolError> {
        let payload_len = checked_len(payload)?;
        let header = FrameHeader::request(opcode, sequence, argument, payload_len);
        Ok(self.append(header, payload))
    }

    /// Encode satu reply frame (append ke buffer)
    pub fn encode_reply(
        &mut self,
        opcode: u8,
        sequence: u64,
        status: u8,
        payload: &[u8],
    ) -> Result<&[u8], ProtocolError> {
        let payload_len = checked_len(payload)?;
        let header = FrameHeader::reply(opcode, sequence, status, payload_len);
        Ok(self.append(header, payload))
    }

    /// Get current buffer content
    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    fn append(&mut self, mut header: FrameHeader, payload: &[u8]) -> &[u8] {
        header.checksum = checksum32(payload);

        let start = self.buffer.len();
        self.buffer.resize(start + HEADER_SIZE, 0);
        header.write_to(&mut self.buffer[start..]);
        self.buffer.extend_from_slice(payload);

        &self.buffer[start..]
    }
}

fn checked_len(payload: &[u8]) -> Result<u32, ProtocolError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge(payload.len()));
    }
    Ok(payload.len() as u32)
}

/// Incremental decoder di atas slice
pub struct Decoder<'a> {
    buffer: &'a [u8],
    read_pos: usize,
}

impl<'a> Decoder<'a> {
    #[inline(always)]
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            read_pos: 0,
        }
    }

    /// Decode frame berikutnya.
    ///
    /// `Ok(None)` berarti frame belum lengkap; posisi baca tidak maju.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<(FrameHeader, &'a [u8])>, ProtocolError> {
        let buffer: &'a [u8] = self.buffer;
        let rest = &buffer[self.read_pos..];
        let Some(header) = FrameHeader::read_from(rest)? else {
            return Ok(None);
        };

        let Some(payload) = rest.get(HEADER_SIZE..header.total_size()) else {
            return Ok(None);
        };

        // Verify checksum
        if header.checksum != 0 {
            let actual = checksum32(payload);
            if actual != header.checksum {
                return Err(ProtocolError::ChecksumMismatch {
                    expected: header.checksum,
                    actual,
                });
            }
        }

        self.read_pos += header.total_size();
        Ok(Some((header, payload)))
    }

    /// Bytes yang sudah di-decode sebagai frame lengkap
    #[inline(always)]
    pub fn consumed(&self) -> usize {
        self.read_pos
    }

    /// Remaining bytes
    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.read_pos)
    }
}
