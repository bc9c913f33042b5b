//! Concurrency Guard: satu lock eksklusif + condition variable
//!
//! Semua operasi (configure, enqueue, bagian atomik dari dequeue) diserialisasi
//! oleh satu `Mutex`. Dequeue yang datanya belum cukup tidur di `Condvar`
//! tanpa memegang lock, lalu cek ulang predicate setiap kali bangun:
//!
//! ```text
//! lock
//! loop {
//!     count >= length  → ambil data, return
//!     dibatalkan?      → return Canceled
//!     wait (lock dilepas selama tidur, diambil lagi saat bangun)
//! }
//! ```
//!
//! Wakeup tidak dianggap menjamin predicate terpenuhi (spurious wakeup,
//! beberapa waiter berebut data yang sama). Urutan waiter yang menang tidak
//! dijamin FIFO.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use super::store::{QueueStore, Snapshot, DEFAULT_MAX_CAPACITY};
use crate::error::QueueError;

/// Queue-level limits
#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
    /// Configure dengan size di atas ini gagal `ResourceExhausted`
    pub max_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_capacity: DEFAULT_MAX_CAPACITY,
        }
    }
}

struct State {
    store: QueueStore,
    /// Naik setiap `cancel_all`; waiter yang melihat epoch berubah akan batal
    epoch: u64,
    waiters: usize,
}

struct Shared {
    state: Mutex<State>,
    readable: Condvar,
}

/// Shared handle to one resizable circular byte queue.
///
/// Clone murah (hanya `Arc`). Semua clone menunjuk ke queue yang sama.
#[derive(Clone)]
pub struct ByteQueue {
    shared: Arc<Shared>,
}

impl Default for ByteQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteQueue {
    /// Queue baru, unconfigured
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    pub fn with_config(config: QueueConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    store: QueueStore::new(config.max_capacity),
                    epoch: 0,
                    waiters: 0,
                }),
                readable: Condvar::new(),
            }),
        }
    }

    /// Ganti storage dengan buffer baru sebesar `size` bytes.
    ///
    /// Data yang masih ada dibuang. Waiter dibangunkan supaya cek ulang
    /// terhadap kapasitas baru.
    pub fn configure(&self, size: i64) -> Result<(), QueueError> {
        let mut state = self.shared.state.lock();
        let result = state.store.configure(size);

        // Configure gagal karena alokasi juga mengubah state (unconfigured)
        if result != Err(QueueError::InvalidArgument) {
            self.shared.readable.notify_all();
        }

        let snap = state.store.snapshot();
        drop(state);

        match result {
            Ok(()) => debug!(size, "queue configured"),
            Err(err) => debug!(size, error = %err, capacity = ?snap.capacity, "configure rejected"),
        }
        result
    }

    /// Enqueue semua bytes atau tidak sama sekali. Tidak pernah blocking.
    pub fn enqueue(&self, bytes: &[u8]) -> Result<(), QueueError> {
        let mut state = self.shared.state.lock();
        state.store.enqueue(bytes)?;
        let snap = state.store.snapshot();
        if !bytes.is_empty() && state.waiters > 0 {
            self.shared.readable.notify_all();
        }
        drop(state);

        debug!(
            len = bytes.len(),
            head = snap.head,
            tail = snap.tail,
            count = snap.count,
            "enqueued"
        );
        Ok(())
    }

    /// Dequeue tepat `length` bytes, blocking sampai data cukup.
    ///
    /// Hanya bisa dibatalkan lewat [`cancel_all`](Self::cancel_all).
    pub fn dequeue(&self, length: usize) -> Result<Vec<u8>, QueueError> {
        self.wait_and_take(length, None)
    }

    /// Seperti [`dequeue`](Self::dequeue), tapi gagal `Canceled` begitu
    /// `cancel` dibatalkan selama menunggu.
    ///
    /// `cancel` harus berasal dari [`cancellation`](Self::cancellation) queue
    /// ini; token milik queue lain tidak bisa membangunkan waiter di sini,
    /// jadi ditolak dengan `InvalidArgument`.
    pub fn dequeue_with(
        &self,
        length: usize,
        cancel: &Cancellation,
    ) -> Result<Vec<u8>, QueueError> {
        if !Arc::ptr_eq(&self.shared, &cancel.shared) {
            debug!(length, "cancellation belongs to another queue");
            return Err(QueueError::InvalidArgument);
        }
        self.wait_and_take(length, Some(cancel))
    }

    /// Non-blocking dequeue. Returns `Ok(None)` jika data belum cukup.
    pub fn try_dequeue(&self, length: usize) -> Result<Option<Vec<u8>>, QueueError> {
        let mut state = self.shared.state.lock();
        let taken = state.store.take(length)?;
        if taken.is_some() {
            let snap = state.store.snapshot();
            drop(state);
            log_dequeued(length, &snap);
        }
        Ok(taken)
    }

    /// Token pembatalan untuk satu (atau beberapa) dequeue di queue ini
    pub fn cancellation(&self) -> Cancellation {
        Cancellation {
            shared: Arc::clone(&self.shared),
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Batalkan semua dequeue yang sedang menunggu saat ini.
    ///
    /// Dequeue yang dimulai setelah call ini tidak terpengaruh.
    pub fn cancel_all(&self) {
        let mut state = self.shared.state.lock();
        state.epoch = state.epoch.wrapping_add(1);
        let waiters = state.waiters;
        self.shared.readable.notify_all();
        drop(state);

        debug!(waiters, "canceled all pending dequeues");
    }

    /// Jumlah dequeue yang sedang tidur menunggu data
    pub fn waiters(&self) -> usize {
        self.shared.state.lock().waiters
    }

    pub fn snapshot(&self) -> Snapshot {
        self.shared.state.lock().store.snapshot()
    }

    fn wait_and_take(
        &self,
        length: usize,
        cancel: Option<&Cancellation>,
    ) -> Result<Vec<u8>, QueueError> {
        let mut state = self.shared.state.lock();
        let epoch = state.epoch;

        loop {
            // Predicate dulu, baru cek pembatalan
            if let Some(bytes) = state.store.take(length)? {
                let snap = state.store.snapshot();
                drop(state);
                log_dequeued(length, &snap);
                return Ok(bytes);
            }

            if state.epoch != epoch || cancel.is_some_and(Cancellation::is_canceled) {
                let count = state.store.count();
                drop(state);
                debug!(length, count, "dequeue canceled");
                return Err(QueueError::Canceled);
            }

            trace!(length, count = state.store.count(), "dequeue waiting");
            state.waiters += 1;
            self.shared.readable.wait(&mut state);
            state.waiters -= 1;
        }
    }
}

fn log_dequeued(length: usize, snap: &Snapshot) {
    debug!(
        len = length,
        head = snap.head,
        tail = snap.tail,
        count = snap.count,
        "dequeued"
    );
}

/// Handle untuk membatalkan dequeue yang sedang blocking.
///
/// Clone berbagi flag yang sama. Sekali dibatalkan, token tetap dalam
/// keadaan canceled.
#[derive(Clone)]
pub struct Cancellation {
    shared: Arc<Shared>,
    flag: Arc<AtomicBool>,
}

impl Cancellation {
    /// Batalkan dan bangunkan waiter.
    ///
    /// Lock diambil sebentar supaya wakeup tidak hilang di antara cek flag
    /// dan `wait` di sisi waiter.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
        let _state = self.shared.state.lock();
        self.shared.readable.notify_all();
    }

    #[inline(always)]
    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn wait_for_waiters(queue: &ByteQueue, n: usize) {
        while queue.waiters() < n {
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_dequeue_available_does_not_block() {
        let queue = ByteQueue::new();
        queue.configure(8).unwrap();
        queue.enqueue(b"hello").unwrap();

        assert_eq!(queue.dequeue(2).unwrap(), b"he");
        assert_eq!(queue.snapshot().count, 3);
        assert_eq!(queue.waiters(), 0);
    }

    #[test]
    fn test_blocked_dequeue_wakes_on_enqueue() {
        let queue = ByteQueue::new();
        queue.configure(4).unwrap();

        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || queue.dequeue(3))
        };

        wait_for_waiters(&queue, 1);
        queue.enqueue(b"ab").unwrap();
        // Masih kurang satu byte, harus tetap menunggu
        thread::sleep(Duration::from_millis(20));
        assert_eq!(queue.waiters(), 1);

        queue.enqueue(b"c").unwrap();
        assert_eq!(consumer.join().unwrap().unwrap(), b"abc");
        assert_eq!(queue.snapshot().count, 0);
    }

    #[test]
    fn test_cancellation_releases_waiter_without_mutation() {
        let queue = ByteQueue::new();
        queue.configure(4).unwrap();
        queue.enqueue(b"x").unwrap();

        let cancel = queue.cancellation();
        let consumer = {
            let queue = queue.clone();
            let cancel = cancel.clone();
            thread::spawn(move || queue.dequeue_with(2, &cancel))
        };

        wait_for_waiters(&queue, 1);
        cancel.cancel();

        assert_eq!(consumer.join().unwrap(), Err(QueueError::Canceled));
        assert_eq!(queue.snapshot().count, 1);
        assert_eq!(queue.waiters(), 0);
        // Lock tidak tertinggal
        queue.enqueue(b"y").unwrap();
    }

    #[test]
    fn test_cancel_all_releases_every_waiter() {
        let queue = ByteQueue::new();
        queue.configure(4).unwrap();

        let consumers: Vec<_> = (0..3)
            .map(|_| {
                let queue = queue.clone();
                thread::spawn(move || queue.dequeue(1))
            })
            .collect();

        wait_for_waiters(&queue, 3);
        queue.cancel_all();

        for consumer in consumers {
            assert_eq!(consumer.join().unwrap(), Err(QueueError::Canceled));
        }

        // Dequeue baru setelah cancel_all tetap berjalan normal
        queue.enqueue(b"k").unwrap();
        assert_eq!(queue.dequeue(1).unwrap(), b"k");
    }

    #[test]
    fn test_shrinking_reconfigure_fails_oversized_waiter() {
        let queue = ByteQueue::new();
        queue.configure(8).unwrap();

        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || queue.dequeue(6))
        };

        wait_for_waiters(&queue, 1);
        queue.configure(4).unwrap();
        assert_eq!(consumer.join().unwrap(), Err(QueueError::InvalidArgument));
    }

    #[test]
    fn test_failed_reconfigure_fails_waiter_unconfigured() {
        let queue = ByteQueue::with_config(QueueConfig { max_capacity: 16 });
        queue.configure(8).unwrap();
        queue.enqueue(b"ab").unwrap();

        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || queue.dequeue(4))
        };

        wait_for_waiters(&queue, 1);
        // Storage lama sudah dilepas sebelum alokasi gagal
        assert_eq!(queue.configure(32), Err(QueueError::ResourceExhausted));
        assert_eq!(consumer.join().unwrap(), Err(QueueError::FailedPrecondition));
        assert_eq!(queue.snapshot().capacity, None);
        assert_eq!(queue.waiters(), 0);
    }

    #[test]
    fn test_foreign_cancellation_is_rejected() {
        let queue = ByteQueue::new();
        let other = ByteQueue::new();
        queue.configure(4).unwrap();
        queue.enqueue(b"zz").unwrap();

        let foreign = other.cancellation();
        assert_eq!(
            queue.dequeue_with(1, &foreign),
            Err(QueueError::InvalidArgument)
        );
        // Tidak ada data yang diambil, tidak ada waiter tertinggal
        assert_eq!(queue.snapshot().count, 2);
        assert_eq!(queue.waiters(), 0);
        assert_eq!(queue.dequeue_with(2, &queue.cancellation()).unwrap(), b"zz");
    }

    #[test]
    fn test_try_dequeue() {
        let queue = ByteQueue::new();
        assert_eq!(queue.try_dequeue(1), Err(QueueError::FailedPrecondition));

        queue.configure(3).unwrap();
        assert_eq!(queue.try_dequeue(1), Ok(None));
        queue.enqueue(b"q").unwrap();
        assert_eq!(queue.try_dequeue(1), Ok(Some(b"q".to_vec())));
    }
}
