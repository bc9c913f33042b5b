//! Framed connection dengan buffered I/O
//!
//! Blocking socket, satu thread per connection. Read buffer tumbuh sesuai
//! kebutuhan sampai satu frame maksimum, encoder dipakai ulang untuk setiap
//! frame yang dikirim.

use std::io::{self, Read, Write};
use std::net::TcpStream;

use crate::error::WireError;
use crate::protocol::{Decoder, Encoder, FrameHeader, HEADER_SIZE, MAX_PAYLOAD_SIZE};

/// Buffer sizes - tuned untuk typical command sizes
const READ_BUFFER_SIZE: usize = 64 * 1024; // 64KB
const MAX_READ_BUFFER: usize = HEADER_SIZE + MAX_PAYLOAD_SIZE;

/// One decoded frame with an owned payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    pub payload: Vec<u8>,
}

pub struct Connection {
    stream: TcpStream,
    read_buffer: Vec<u8>,
    read_len: usize,
    encoder: Encoder,
}

impl Connection {
    /// Wrap TcpStream dengan framed I/O
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        // Disable Nagle's algorithm untuk lower latency
        stream.set_nodelay(true)?;

        Ok(Self {
            stream,
            read_buffer: vec![0u8; READ_BUFFER_SIZE],
            read_len: 0,
            encoder: Encoder::default(),
        })
    }

    /// Baca satu frame lengkap.
    ///
    /// Returns `Ok(None)` jika peer menutup koneksi di batas frame.
    pub fn read_frame(&mut self) -> Result<Option<Frame>, WireError> {
        loop {
            let mut decoder = Decoder::new(&self.read_buffer[..self.read_len]);
            if let Some((header, payload)) = decoder.next()? {
                let frame = Frame {
                    header,
                    payload: payload.to_vec(),
                };
                let consumed = decoder.consumed();
                self.consume(consumed);
                return Ok(Some(frame));
            }

            if self.read_len == self.read_buffer.len() {
                let grown = (self.read_buffer.len() * 2).min(MAX_READ_BUFFER);
                self.read_buffer.resize(grown, 0);
            }

            match self.stream.read(&mut self.read_buffer[self.read_len..]) {
                Ok(0) if self.read_len == 0 => return Ok(None),
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "connection closed mid-frame",
                    )
                    .into())
                }
                Ok(n) => self.read_len += n,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn send_request(
        &mut self,
        opcode: u8,
        sequence: u64,
        argument: i64,
        payload: &[u8],
    ) -> Result<(), WireError> {
        self.encoder.reset();
        let bytes = self
            .encoder
            .encode_request(opcode, sequence, argument, payload)?;
        self.stream.write_all(bytes)?;
        Ok(())
    }

    pub fn send_reply(
        &mut self,
        opcode: u8,
        sequence: u64,
        status: u8,
        payload: &[u8],
    ) -> Result<(), WireError> {
        self.encoder.reset();
        let bytes = self.encoder.encode_reply(opcode, sequence, status, payload)?;
        self.stream.write_all(bytes)?;
        Ok(())
    }

    /// Baca bytes yang sudah tersedia ke read buffer tanpa decode.
    ///
    /// Dipakai selama dequeue blocking: request yang di-pipeline client
    /// disimpan untuk [`read_frame`](Self::read_frame) berikutnya, sehingga
    /// EOF tetap terlihat walaupun ada data yang belum diproses.
    /// Returns `Ok(Some(0))` jika peer menutup koneksi, `Ok(None)` jika
    /// buffer sudah penuh sampai batas satu frame maksimum.
    pub fn fill_buffer(&mut self) -> io::Result<Option<usize>> {
        if self.read_len == self.read_buffer.len() {
            if self.read_buffer.len() == MAX_READ_BUFFER {
                return Ok(None);
            }
            let grown = (self.read_buffer.len() * 2).min(MAX_READ_BUFFER);
            self.read_buffer.resize(grown, 0);
        }

        let n = self.stream.read(&mut self.read_buffer[self.read_len..])?;
        self.read_len += n;
        Ok(Some(n))
    }

    /// Get underlying stream
    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    /// Bytes yang sudah dibaca tapi belum membentuk frame lengkap
    #[inline(always)]
    pub fn buffered(&self) -> usize {
        self.read_len
    }

    /// Shift remaining data to front of buffer
    fn consume(&mut self, n: usize) {
        if n < self.read_len {
            self.read_buffer.copy_within(n..self.read_len, 0);
            self.read_len -= n;
        } else {
            self.read_len = 0;
        }

        // Lepas memori frame besar begitu sisa data muat di ukuran awal
        if self.read_buffer.len() > READ_BUFFER_SIZE && self.read_len <= READ_BUFFER_SIZE {
            self.read_buffer.truncate(READ_BUFFER_SIZE);
            self.read_buffer.shrink_to_fit();
        }
    }
}

/// Set SO_SNDBUF / SO_RCVBUF.
///
/// Error diabaikan - tidak semua platform support.
#[cfg(unix)]
pub fn set_socket_buffers(stream: &TcpStream, bytes: usize) {
    use std::os::unix::io::AsRawFd;

    let fd = stream.as_raw_fd();
    let optval: libc::c_int = bytes.min(libc::c_int::MAX as usize) as libc::c_int;
    // SAFETY: fd valid selama `stream` hidup, optval adalah c_int di stack
    unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_SNDBUF,
            &optval as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_RCVBUF,
            &optval as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
    }
}

#[cfg(not(unix))]
pub fn set_socket_buffers(_stream: &TcpStream, _bytes: usize) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    fn pair() -> (Connection, Connection) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = thread::spawn(move || TcpStream::connect(addr).unwrap());
        let (server, _) = listener.accept().unwrap();
        (
            Connection::new(client.join().unwrap()).unwrap(),
            Connection::new(server).unwrap(),
        )
    }

    #[test]
    fn test_request_reply_over_socket() {
        let (mut client, mut server) = pair();

        client.send_request(2, 7, 3, b"abc").unwrap();
        let frame = server.read_frame().unwrap().unwrap();
        assert_eq!(frame.header.sequence, 7);
        assert_eq!(frame.header.argument, 3);
        assert_eq!(frame.payload, b"abc");

        server.send_reply(2, 7, 0, &[]).unwrap();
        let reply = client.read_frame().unwrap().unwrap();
        assert!(reply.header.is_reply());
        assert_eq!(reply.header.status, 0);
    }

    #[test]
    fn test_large_payload_grows_buffer() {
        let (mut client, mut server) = pair();
        let payload = vec![0xABu8; READ_BUFFER_SIZE * 3];

        let writer = thread::spawn(move || {
            client.send_request(2, 1, payload.len() as i64, &payload).unwrap();
            client
        });

        let frame = server.read_frame().unwrap().unwrap();
        assert_eq!(frame.payload.len(), READ_BUFFER_SIZE * 3);
        assert!(frame.payload.iter().all(|&b| b == 0xAB));
        assert_eq!(server.buffered(), 0);
        drop(writer.join().unwrap());
    }

    #[test]
    fn test_read_buffer_shrinks_after_large_frame() {
        let (mut client, mut server) = pair();
        let payload = vec![0x5Au8; READ_BUFFER_SIZE * 4];

        let writer = thread::spawn(move || {
            client.send_request(2, 1, payload.len() as i64, &payload).unwrap();
            client.send_request(3, 2, 1, &[]).unwrap();
            client
        });

        let big = server.read_frame().unwrap().unwrap();
        assert_eq!(big.payload.len(), READ_BUFFER_SIZE * 4);
        assert_eq!(server.read_buffer.len(), READ_BUFFER_SIZE);
        assert!(server.read_buffer.capacity() < READ_BUFFER_SIZE * 2);

        let small = server.read_frame().unwrap().unwrap();
        assert_eq!(small.header.sequence, 2);
        drop(writer.join().unwrap());
    }

    #[test]
    fn test_fill_buffer_keeps_pipelined_frames() {
        let (mut client, mut server) = pair();

        client.send_request(1, 1, 8, &[]).unwrap();
        client.send_request(2, 2, 2, b"hi").unwrap();
        drop(client);

        // Kumpulkan semua bytes sampai EOF, frame tetap utuh di buffer
        while server.fill_buffer().unwrap() != Some(0) {}
        assert!(server.buffered() > 0);

        assert_eq!(server.read_frame().unwrap().unwrap().header.sequence, 1);
        let second = server.read_frame().unwrap().unwrap();
        assert_eq!(second.payload, b"hi");
        assert!(server.read_frame().unwrap().is_none());
    }

    #[test]
    fn test_clean_close_returns_none() {
        let (client, mut server) = pair();
        drop(client);
        assert!(server.read_frame().unwrap().is_none());
    }
}
