//! Command server: satu thread per connection
//!
//! Dequeue bisa blocking tanpa batas waktu, jadi event loop non-blocking
//! tidak cocok di sini: satu dequeue yang menunggu akan menahan semua client.
//! Setiap connection mendapat thread sendiri, semua berbagi satu
//! [`QueueService`].
//!
//! Dequeue yang blocking dibatalkan (`Canceled`) jika peer disconnect
//! selama menunggu, atau saat server shutdown.

use std::collections::HashMap;
use std::io;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::connection::{set_socket_buffers, Connection, Frame};
use crate::control::{Opcode, QueueService, Reply, ServiceConfig};
use crate::core::{ByteQueue, Cancellation, QueueConfig, DEFAULT_MAX_CAPACITY};
use crate::error::{QueueError, WireError};
use crate::protocol::{FrameHeader, MAX_PAYLOAD_SIZE};

/// Interval cek peer selama dequeue blocking
const PEER_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Batas atas untuk CONFIGURE
    pub max_capacity: usize,
    /// Configure queue saat start, sebelum client pertama
    pub initial_capacity: Option<usize>,
    /// SO_SNDBUF / SO_RCVBUF per client
    pub socket_buffer: usize,
    /// Log setiap command
    pub verbose: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7878".to_string(),
            max_capacity: DEFAULT_MAX_CAPACITY,
            initial_capacity: None,
            socket_buffer: 256 * 1024, // 256KB
            verbose: false,
        }
    }
}

/// Server statistics
#[derive(Default)]
pub struct ServerStats {
    pub commands: AtomicU64,
    pub command_errors: AtomicU64,
    pub dequeues_canceled: AtomicU64,
    pub bytes_enqueued: AtomicU64,
    pub bytes_dequeued: AtomicU64,
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
}

impl ServerStats {
    pub fn log(&self, uptime: Duration) {
        info!(
            uptime_secs = uptime.as_secs_f64(),
            commands = self.commands.load(Ordering::Relaxed),
            errors = self.command_errors.load(Ordering::Relaxed),
            canceled = self.dequeues_canceled.load(Ordering::Relaxed),
            bytes_in = self.bytes_enqueued.load(Ordering::Relaxed),
            bytes_out = self.bytes_dequeued.load(Ordering::Relaxed),
            connections = self.connections_active.load(Ordering::Relaxed),
            "server stats"
        );
    }
}

type ClientRegistry = Arc<Mutex<HashMap<u64, TcpStream>>>;

pub struct Server {
    listener: TcpListener,
    service: QueueService,
    config: ServerConfig,
    stats: Arc<ServerStats>,
    clients: ClientRegistry,
    shutdown: Arc<AtomicBool>,
}

/// Menghentikan [`Server::run`] dari thread lain
#[derive(Clone)]
pub struct ShutdownHandle {
    addr: SocketAddr,
    queue: ByteQueue,
    clients: ClientRegistry,
    shutdown: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Stop accept loop, batalkan dequeue yang menunggu, tutup semua client
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }

        self.queue.cancel_all();
        for stream in self.clients.lock().values() {
            let _ = stream.shutdown(Shutdown::Both);
        }

        // Bangunkan accept() yang sedang blocking
        let _ = TcpStream::connect(self.addr);
    }
}

impl Server {
    /// Bind listener dan siapkan queue baru sesuai config
    pub fn bind(config: ServerConfig) -> io::Result<Self> {
        let queue = ByteQueue::with_config(QueueConfig {
            max_capacity: config.max_capacity,
        });
        let service = QueueService::with_config(
            queue,
            ServiceConfig {
                max_transfer: MAX_PAYLOAD_SIZE,
            },
        );

        if let Some(capacity) = config.initial_capacity {
            let size = i64::try_from(capacity).unwrap_or(i64::MAX);
            service.configure(size).map_err(|err| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("initial capacity {}: {}", capacity, err),
                )
            })?;
        }

        Self::with_service(config, service)
    }

    /// Bind listener di atas service yang sudah ada
    pub fn with_service(config: ServerConfig, service: QueueService) -> io::Result<Self> {
        let listener = TcpListener::bind(&config.bind_addr)?;

        Ok(Self {
            listener,
            service,
            config,
            stats: Arc::new(ServerStats::default()),
            clients: Arc::new(Mutex::new(HashMap::new())),
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn service(&self) -> &QueueService {
        &self.service
    }

    pub fn stats(&self) -> Arc<ServerStats> {
        Arc::clone(&self.stats)
    }

    pub fn shutdown_handle(&self) -> io::Result<ShutdownHandle> {
        Ok(ShutdownHandle {
            addr: self.local_addr()?,
            queue: self.service.queue().clone(),
            clients: Arc::clone(&self.clients),
            shutdown: Arc::clone(&self.shutdown),
        })
    }

    /// Accept loop. Return setelah [`ShutdownHandle::shutdown`].
    pub fn run(self) -> io::Result<()> {
        let start_time = Instant::now();
        let mut next_client_id = 0u64;
        let mut handlers: Vec<JoinHandle<()>> = Vec::new();

        info!(addr = %self.local_addr()?, "circq server listening");

        for incoming in self.listener.incoming() {
            if self.shutdown.load(Ordering::Acquire) {
                break;
            }

            let stream = match incoming {
                Ok(stream) => stream,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(error = %e, "accept error");
                    continue;
                }
            };

            let id = next_client_id;
            next_client_id += 1;

            match self.spawn_client(id, stream) {
                Ok(handle) => {
                    handlers.retain(|h| !h.is_finished());
                    handlers.push(handle);
                }
                Err(e) => warn!(client = id, error = %e, "failed to setup client"),
            }
        }

        // Client yang masih jalan sudah di-shutdown, tunggu sampai selesai
        for handle in handlers {
            if handle.join().is_err() {
                warn!("client thread panicked");
            }
        }

        info!("circq server stopped");
        self.stats.log(start_time.elapsed());
        Ok(())
    }

    fn spawn_client(&self, id: u64, stream: TcpStream) -> io::Result<JoinHandle<()>> {
        let addr = stream.peer_addr()?;
        set_socket_buffers(&stream, self.config.socket_buffer);

        let registered = stream.try_clone()?;
        let mut handler = ClientHandler {
            id,
            addr,
            conn: Connection::new(stream)?,
            service: self.service.clone(),
            stats: Arc::clone(&self.stats),
            verbose: self.config.verbose,
        };

        {
            let mut clients = self.clients.lock();
            // Shutdown bisa terjadi di antara accept dan registrasi
            if self.shutdown.load(Ordering::Acquire) {
                let _ = registered.shutdown(Shutdown::Both);
            }
            clients.insert(id, registered);
        }
        self.stats.connections_total.fetch_add(1, Ordering::Relaxed);
        self.stats.connections_active.fetch_add(1, Ordering::Relaxed);
        info!(client = id, %addr, "connected");

        let clients = Arc::clone(&self.clients);
        let spawned = thread::Builder::new()
            .name(format!("circq-client-{}", id))
            .spawn(move || {
                handler.serve();
                clients.lock().remove(&handler.id);
                handler
                    .stats
                    .connections_active
                    .fetch_sub(1, Ordering::Relaxed);
                info!(client = handler.id, addr = %handler.addr, "disconnected");
            });

        spawned.map_err(|e| {
            self.clients.lock().remove(&id);
            self.stats.connections_active.fetch_sub(1, Ordering::Relaxed);
            e
        })
    }
}

/// Per-connection state
struct ClientHandler {
    id: u64,
    addr: SocketAddr,
    conn: Connection,
    service: QueueService,
    stats: Arc<ServerStats>,
    verbose: bool,
}

impl ClientHandler {
    fn serve(&mut self) {
        loop {
            let frame = match self.conn.read_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => return,
                Err(WireError::Protocol(e)) => {
                    warn!(client = self.id, error = %e, "protocol violation, closing");
                    return;
                }
                Err(WireError::Io(e)) => {
                    debug!(client = self.id, error = %e, "read failed");
                    return;
                }
            };

            if frame.header.is_reply() {
                warn!(client = self.id, "client sent a reply frame, closing");
                return;
            }

            let header = frame.header;
            let outcome = match self.execute(frame) {
                Ok(outcome) => outcome,
                Err(e) => {
                    debug!(client = self.id, error = %e, "dequeue watcher setup failed");
                    return;
                }
            };

            if let Err(e) = self.reply(&header, outcome) {
                debug!(client = self.id, error = %e, "write failed");
                return;
            }
        }
    }

    fn execute(&mut self, frame: Frame) -> io::Result<Result<Reply, QueueError>> {
        let code = frame.header.command_code();
        let argument = frame.header.argument;
        self.stats.commands.fetch_add(1, Ordering::Relaxed);

        if self.verbose {
            debug!(client = self.id, opcode = code, argument, "command");
        }

        let outcome = if Opcode::from_u8(code) == Some(Opcode::Dequeue) {
            self.dequeue(argument)?.map(Reply::Data)
        } else {
            let len = frame.payload.len();
            let outcome = self.service.dispatch(code, argument, frame.payload, None);
            if code == Opcode::Enqueue as u8 && outcome.is_ok() {
                let enqueued = usize::try_from(argument).unwrap_or(len);
                self.stats
                    .bytes_enqueued
                    .fetch_add(enqueued as u64, Ordering::Relaxed);
            }
            outcome
        };

        match &outcome {
            Ok(Reply::Data(data)) => {
                self.stats
                    .bytes_dequeued
                    .fetch_add(data.len() as u64, Ordering::Relaxed);
            }
            Ok(Reply::Done) => {}
            Err(QueueError::Canceled) => {
                self.stats.dequeues_canceled.fetch_add(1, Ordering::Relaxed);
                self.stats.command_errors.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.stats.command_errors.fetch_add(1, Ordering::Relaxed);
            }
        }

        Ok(outcome)
    }

    /// Dequeue dengan fast path non-blocking; jika harus menunggu, peer
    /// dipantau supaya disconnect membatalkan dequeue.
    fn dequeue(&mut self, length: i64) -> io::Result<Result<Vec<u8>, QueueError>> {
        match self.service.try_dequeue(length) {
            Ok(Some(data)) => return Ok(Ok(data)),
            Ok(None) => {}
            Err(err) => return Ok(Err(err)),
        }

        // Watcher membaca socket dengan timeout supaya bisa cek `done`
        self.conn.stream().set_read_timeout(Some(PEER_POLL_INTERVAL))?;

        let watcher = thread::Builder::new().name(format!("circq-watch-{}", self.id));
        let cancel = self.service.cancellation();
        let done = AtomicBool::new(false);
        let (conn, service) = (&mut self.conn, &self.service);
        let (cancel_ref, done_ref) = (&cancel, &done);

        let outcome = thread::scope(|s| -> io::Result<_> {
            watcher.spawn_scoped(s, move || watch_peer(conn, cancel_ref, done_ref))?;
            let outcome = service.dequeue(length, Some(cancel_ref));
            done_ref.store(true, Ordering::Release);
            Ok(outcome)
        });

        self.conn.stream().set_read_timeout(None)?;
        let outcome = outcome?;

        if outcome == Err(QueueError::Canceled) {
            debug!(client = self.id, length, "blocked dequeue canceled");
        }
        Ok(outcome)
    }

    fn reply(
        &mut self,
        request: &FrameHeader,
        outcome: Result<Reply, QueueError>,
    ) -> Result<(), WireError> {
        let code = request.command_code();
        let sequence = request.sequence;

        match outcome {
            Ok(reply) => self.conn.send_reply(code, sequence, 0, &reply.into_data()),
            Err(err) => self.conn.send_reply(code, sequence, err.status(), &[]),
        }
    }
}

/// Batalkan `cancel` begitu peer menutup koneksi.
///
/// Request yang di-pipeline selama menunggu ditampung di read buffer
/// `conn`, jadi EOF di belakangnya tetap terdeteksi.
fn watch_peer(conn: &mut Connection, cancel: &Cancellation, done: &AtomicBool) {
    while !done.load(Ordering::Acquire) {
        match conn.fill_buffer() {
            Ok(Some(0)) => {
                cancel.cancel();
                return;
            }
            Ok(Some(_)) => {}
            // Buffer penuh: tidak bisa membaca lagi tanpa kehilangan data
            Ok(None) => {
                if peer_hung_up(conn.stream()) {
                    cancel.cancel();
                    return;
                }
                thread::sleep(PEER_POLL_INTERVAL);
            }
            Err(ref e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) => {}
            Err(_) => {
                cancel.cancel();
                return;
            }
        }
    }
}

/// Cek hang-up tanpa membaca data yang masih antre di socket
#[cfg(target_os = "linux")]
fn peer_hung_up(stream: &TcpStream) -> bool {
    use std::os::unix::io::AsRawFd;

    let mut pfd = libc::pollfd {
        fd: stream.as_raw_fd(),
        events: libc::POLLRDHUP,
        revents: 0,
    };
    // SAFETY: satu pollfd valid di stack, fd hidup selama `stream`
    let ready = unsafe { libc::poll(&mut pfd, 1, 0) };
    ready > 0 && pfd.revents & (libc::POLLRDHUP | libc::POLLHUP | libc::POLLERR) != 0
}

#[cfg(not(target_os = "linux"))]
fn peer_hung_up(_stream: &TcpStream) -> bool {
    false
}
