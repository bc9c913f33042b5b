//! Queue Store: backing storage + bookkeeping
//!
//! Struktur data murni tanpa locking. Semua akses harus lewat
//! [`ByteQueue`](super::ByteQueue) yang memegang lock.
//!
//! Prinsip:
//! - All-or-nothing: enqueue/dequeue tidak pernah parsial
//! - Tidak ada mutasi saat gagal (kecuali configure, lihat [`QueueStore::configure`])

use super::ring_index::RingIndex;
use crate::error::QueueError;

/// Batas default kapasitas: 64MB
pub const DEFAULT_MAX_CAPACITY: usize = 64 * 1024 * 1024;

/// Read-only copy of the queue bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Snapshot {
    /// `None` selama queue belum dikonfigurasi
    pub capacity: Option<usize>,
    pub head: usize,
    pub tail: usize,
    pub count: usize,
}

/// Storage yang sudah dialokasikan
struct Ring {
    storage: Box<[u8]>,
    index: RingIndex,
}

pub struct QueueStore {
    ring: Option<Ring>,
    max_capacity: usize,
}

impl QueueStore {
    /// Queue baru dalam keadaan unconfigured (belum ada storage)
    pub fn new(max_capacity: usize) -> Self {
        Self {
            ring: None,
            max_capacity,
        }
    }

    #[inline(always)]
    pub fn is_configured(&self) -> bool {
        self.ring.is_some()
    }

    #[inline(always)]
    pub fn capacity(&self) -> Option<usize> {
        self.ring.as_ref().map(|r| r.index.capacity())
    }

    #[inline(always)]
    pub fn count(&self) -> usize {
        self.ring.as_ref().map_or(0, |r| r.index.count())
    }

    pub fn snapshot(&self) -> Snapshot {
        match &self.ring {
            Some(r) => Snapshot {
                capacity: Some(r.index.capacity()),
                head: r.index.head(),
                tail: r.index.tail(),
                count: r.index.count(),
            },
            None => Snapshot::default(),
        }
    }

    /// Buang storage lama dan alokasikan storage baru sebesar `size` bytes.
    ///
    /// Data yang masih ada di queue hilang (disengaja). Jika alokasi gagal,
    /// queue tetap unconfigured.
    pub fn configure(&mut self, size: i64) -> Result<(), QueueError> {
        if size <= 0 {
            return Err(QueueError::InvalidArgument);
        }

        // Release storage lama dulu, jangan sampai ada dua owner sekaligus
        self.ring = None;

        let size = usize::try_from(size).map_err(|_| QueueError::ResourceExhausted)?;
        if size > self.max_capacity {
            return Err(QueueError::ResourceExhausted);
        }

        let mut storage = Vec::new();
        storage
            .try_reserve_exact(size)
            .map_err(|_| QueueError::ResourceExhausted)?;
        storage.resize(size, 0u8);

        self.ring = Some(Ring {
            storage: storage.into_boxed_slice(),
            index: RingIndex::new(size),
        });

        Ok(())
    }

    /// Tulis semua `bytes` di tail, atau tidak sama sekali.
    pub fn enqueue(&mut self, bytes: &[u8]) -> Result<(), QueueError> {
        let ring = self.ring.as_mut().ok_or(QueueError::FailedPrecondition)?;

        // Cek sebelum menulis apapun
        if bytes.len() > ring.index.free() {
            return Err(QueueError::ResourceExhausted);
        }

        let seg = ring.index.write_segments(bytes.len());
        let split = seg.first.len();
        ring.storage[seg.first].copy_from_slice(&bytes[..split]);
        ring.storage[seg.second].copy_from_slice(&bytes[split..]);
        ring.index.commit_write(bytes.len());

        Ok(())
    }

    /// Ambil tepat `length` bytes dari head.
    ///
    /// Returns `Ok(None)` jika data belum cukup; caller yang memutuskan
    /// apakah harus menunggu. `length > capacity` tidak akan pernah
    /// terpenuhi, jadi ditolak dengan `InvalidArgument`.
    pub fn take(&mut self, length: usize) -> Result<Option<Vec<u8>>, QueueError> {
        let ring = self.ring.as_mut().ok_or(QueueError::FailedPrecondition)?;

        if length == 0 {
            return Ok(Some(Vec::new()));
        }
        if length > ring.index.capacity() {
            return Err(QueueError::InvalidArgument);
        }
        if ring.index.count() < length {
            return Ok(None);
        }

        let seg = ring.index.read_segments(length);
        let mut out = Vec::with_capacity(length);
        out.extend_from_slice(&ring.storage[seg.first]);
        out.extend_from_slice(&ring.storage[seg.second]);
        ring.index.commit_read(length);

        Ok(Some(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured(size: i64) -> QueueStore {
        let mut store = QueueStore::new(DEFAULT_MAX_CAPACITY);
        store.configure(size).unwrap();
        store
    }

    #[test]
    fn test_unconfigured_rejects_io() {
        let mut store = QueueStore::new(DEFAULT_MAX_CAPACITY);
        assert!(!store.is_configured());
        assert_eq!(store.enqueue(b"a"), Err(QueueError::FailedPrecondition));
        assert_eq!(store.take(0), Err(QueueError::FailedPrecondition));
        assert_eq!(store.snapshot(), Snapshot::default());
    }

    #[test]
    fn test_configure_rejects_non_positive() {
        let mut store = QueueStore::new(DEFAULT_MAX_CAPACITY);
        assert_eq!(store.configure(0), Err(QueueError::InvalidArgument));
        assert_eq!(store.configure(-5), Err(QueueError::InvalidArgument));
        assert!(!store.is_configured());
    }

    #[test]
    fn test_invalid_configure_keeps_existing_data() {
        let mut store = configured(4);
        store.enqueue(b"ab").unwrap();
        assert_eq!(store.configure(0), Err(QueueError::InvalidArgument));
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn test_configure_over_limit_leaves_unconfigured() {
        let mut store = QueueStore::new(16);
        store.configure(8).unwrap();
        store.enqueue(b"abc").unwrap();

        assert_eq!(store.configure(17), Err(QueueError::ResourceExhausted));
        assert!(!store.is_configured());
        assert_eq!(store.capacity(), None);
    }

    #[test]
    fn test_enqueue_overflow_is_atomic() {
        let mut store = configured(5);
        store.enqueue(&[1, 2, 3]).unwrap();
        let before = store.snapshot();

        assert_eq!(store.enqueue(&[4, 5, 6]), Err(QueueError::ResourceExhausted));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_take_wraps_and_preserves_order() {
        let mut store = configured(5);
        store.enqueue(b"1234").unwrap();
        assert_eq!(store.take(3).unwrap().unwrap(), b"123");
        store.enqueue(b"abcd").unwrap();

        let snap = store.snapshot();
        assert_eq!(snap.head, 3);
        assert_eq!(snap.tail, 2);
        assert_eq!(snap.count, 5);

        assert_eq!(store.take(5).unwrap().unwrap(), b"4abcd");
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_take_insufficient_returns_none_without_mutation() {
        let mut store = configured(4);
        store.enqueue(b"xy").unwrap();
        let before = store.snapshot();
        assert_eq!(store.take(3), Ok(None));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_take_longer_than_capacity_is_invalid() {
        let mut store = configured(4);
        assert_eq!(store.take(5), Err(QueueError::InvalidArgument));
    }

    #[test]
    fn test_zero_length_operations() {
        let mut store = configured(2);
        store.enqueue(b"zz").unwrap();
        store.enqueue(&[]).unwrap();
        assert_eq!(store.take(0).unwrap().unwrap(), Vec::<u8>::new());
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn test_reconfigure_discards_data() {
        let mut store = configured(4);
        store.enqueue(b"abc").unwrap();
        store.take(1).unwrap();
        store.configure(8).unwrap();

        let snap = store.snapshot();
        assert_eq!(snap.capacity, Some(8));
        assert_eq!((snap.head, snap.tail, snap.count), (0, 0, 0));
    }
}
