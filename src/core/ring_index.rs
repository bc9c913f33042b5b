//! Circular index bookkeeping (head / tail / count) di atas kapasitas tetap
//!
//! Semua aritmatika modulo untuk queue ada di sini, tidak tersebar di call site.
//! Kapasitas tidak harus power of 2, jadi wraparound memakai modulo biasa,
//! bukan mask seperti pada ring buffer SPSC.

use std::ops::Range;

/// Head/tail/count over a fixed capacity.
///
/// Invariant: `head < capacity`, `tail < capacity`, `count <= capacity`,
/// dan `tail == (head + count) % capacity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingIndex {
    head: usize,
    tail: usize,
    count: usize,
    capacity: usize,
}

/// Satu region logis yang dipecah menjadi maksimal dua range fisik.
///
/// `second` kosong jika region tidak melewati akhir storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segments {
    pub first: Range<usize>,
    pub second: Range<usize>,
}

impl Segments {
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.first.len() + self.second.len()
    }
}

impl RingIndex {
    /// # Panics
    /// Panic jika `capacity == 0`
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be positive");
        Self {
            head: 0,
            tail: 0,
            count: 0,
            capacity,
        }
    }

    #[inline(always)]
    pub const fn head(&self) -> usize {
        self.head
    }

    #[inline(always)]
    pub const fn tail(&self) -> usize {
        self.tail
    }

    #[inline(always)]
    pub const fn count(&self) -> usize {
        self.count
    }

    #[inline(always)]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sisa ruang kosong
    #[inline(always)]
    pub const fn free(&self) -> usize {
        self.capacity - self.count
    }

    /// Range fisik untuk menulis `len` bytes mulai dari tail.
    ///
    /// Tidak mengubah state. Caller harus memastikan `len <= free()`.
    #[inline]
    pub fn write_segments(&self, len: usize) -> Segments {
        debug_assert!(len <= self.free());
        self.split(self.tail, len)
    }

    /// Range fisik untuk membaca `len` bytes mulai dari head.
    ///
    /// Tidak mengubah state. Caller harus memastikan `len <= count()`.
    #[inline]
    pub fn read_segments(&self, len: usize) -> Segments {
        debug_assert!(len <= self.count);
        self.split(self.head, len)
    }

    /// Commit `len` bytes yang sudah ditulis di tail
    #[inline]
    pub fn commit_write(&mut self, len: usize) {
        assert!(len <= self.free(), "write past capacity");
        self.tail = (self.tail + len) % self.capacity;
        self.count += len;
        self.check();
    }

    /// Release `len` bytes yang sudah dibaca dari head
    #[inline]
    pub fn commit_read(&mut self, len: usize) {
        assert!(len <= self.count, "read past count");
        self.head = (self.head + len) % self.capacity;
        self.count -= len;
        self.check();
    }

    fn split(&self, start: usize, len: usize) -> Segments {
        // Handle wraparound
        let first_part = (self.capacity - start).min(len);
        Segments {
            first: start..start + first_part,
            second: 0..len - first_part,
        }
    }

    #[inline(always)]
    fn check(&self) {
        debug_assert!(self.head < self.capacity);
        debug_assert!(self.tail < self.capacity);
        debug_assert!(self.count <= self.capacity);
        debug_assert_eq!(self.tail, (self.head + self.count) % self.capacity);
    }
}
