//! Pooled receive buffers.
//!
//! A [`BufferPool`] carves one contiguous backing allocation into
//! equally sized chunks and loans them out whole. Connections check a
//! chunk out to arm a receive and check the same chunk back in once the
//! received bytes have been consumed (or the connection dies).
//!
//! # Design
//!
//! - Chunks are disjoint owned `BytesMut` views split off one backing
//!   `BytesMut`, so a loaned chunk carries its own (region, offset,
//!   length) identity.
//! - `check_in` validates that identity: the chunk must point into the
//!   pool's backing region, start on a chunk boundary and have full
//!   chunk length. Partial returns are rejected.
//! - Double returns are detected against a checked-out ledger in debug
//!   builds.
//! - Chunks are not zeroed between loans.
//!
//! Exhaustion fails the checkout rather than blocking; callers treat it
//! as a fatal error for the connection that needed the buffer.

use crate::error::Error;
use bytes::BytesMut;
use parking_lot::Mutex;

/// A fixed pool of equally sized buffer chunks.
pub struct BufferPool {
    chunk_size: usize,
    chunk_count: usize,
    /// Address of the first byte of the backing region.
    base: usize,
    inner: Mutex<Inner>,
}

struct Inner {
    free: Vec<BytesMut>,
    /// Checked-out ledger indexed by chunk, for double-return detection.
    checked_out: Vec<bool>,
}

impl BufferPool {
    /// Create a pool of `chunk_count` chunks of `chunk_size` bytes each.
    ///
    /// # Panics
    /// Panics if either dimension is zero.
    pub fn new(chunk_size: usize, chunk_count: usize) -> Self {
        assert!(chunk_size > 0, "chunk_size must be positive");
        assert!(chunk_count > 0, "chunk_count must be positive");

        let mut backing = BytesMut::zeroed(chunk_size * chunk_count);
        let base = backing.as_ptr() as usize;

        let mut free = Vec::with_capacity(chunk_count);
        for _ in 0..chunk_count - 1 {
            free.push(backing.split_to(chunk_size));
        }
        free.push(backing);

        Self {
            chunk_size,
            chunk_count,
            base,
            inner: Mutex::new(Inner {
                free,
                checked_out: vec![false; chunk_count],
            }),
        }
    }

    /// Size of each chunk in bytes.
    #[inline]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Total number of chunks.
    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// Number of chunks currently available.
    #[inline]
    pub fn free_count(&self) -> usize {
        self.inner.lock().free.len()
    }

    /// Number of chunks currently on loan.
    #[inline]
    pub fn checked_out_count(&self) -> usize {
        let inner = self.inner.lock();
        self.chunk_count - inner.free.len()
    }

    /// Check out one full chunk.
    ///
    /// The chunk always has length `chunk_size()`; previous contents are
    /// left as-is.
    pub fn check_out(&self) -> Result<BytesMut, Error> {
        let mut inner = self.inner.lock();
        let chunk = inner.free.pop().ok_or(Error::BufferPoolExhausted)?;
        if let Ok(index) = self.index_of(&chunk) {
            inner.checked_out[index] = true;
        }
        Ok(chunk)
    }

    /// Return a chunk to the pool.
    ///
    /// The chunk must be the exact region that was loaned: full length,
    /// chunk-aligned, inside the backing allocation. Anything else is a
    /// programming error; it panics in debug builds and the chunk is
    /// discarded in release builds.
    pub fn check_in(&self, chunk: BytesMut) {
        let index = match self.index_of(&chunk) {
            Ok(index) => index,
            Err(_) => {
                debug_assert!(false, "returned buffer is not a full pool chunk");
                tracing::error!("discarding a buffer that is not a full pool chunk");
                return;
            }
        };

        let mut inner = self.inner.lock();
        debug_assert!(
            inner.checked_out[index],
            "double return of pool chunk {index}"
        );
        inner.checked_out[index] = false;
        inner.free.push(chunk);
    }

    /// Map a chunk back to its index, validating the full loaned triple.
    fn index_of(&self, chunk: &BytesMut) -> Result<usize, Error> {
        let ptr = chunk.as_ptr() as usize;
        let end = self.base + self.chunk_size * self.chunk_count;
        if ptr < self.base || ptr >= end {
            return Err(Error::InvalidBuffer);
        }
        let offset = ptr - self.base;
        if offset % self.chunk_size != 0 || chunk.len() != self.chunk_size {
            return Err(Error::InvalidBuffer);
        }
        Ok(offset / self.chunk_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_out_and_in() {
        let pool = BufferPool::new(1024, 4);
        assert_eq!(pool.chunk_size(), 1024);
        assert_eq!(pool.chunk_count(), 4);
        assert_eq!(pool.free_count(), 4);

        let a = pool.check_out().unwrap();
        let b = pool.check_out().unwrap();
        assert_eq!(a.len(), 1024);
        assert_eq!(pool.free_count(), 2);
        assert_eq!(pool.checked_out_count(), 2);

        pool.check_in(a);
        pool.check_in(b);
        assert_eq!(pool.free_count(), 4);
        assert_eq!(pool.checked_out_count(), 0);
    }

    #[test]
    fn test_exhaustion_fails() {
        let pool = BufferPool::new(64, 2);
        let _a = pool.check_out().unwrap();
        let _b = pool.check_out().unwrap();
        assert!(matches!(
            pool.check_out(),
            Err(Error::BufferPoolExhausted)
        ));
    }

    #[test]
    fn test_chunks_are_writable_and_reused() {
        let pool = BufferPool::new(8, 2);

        let mut chunk = pool.check_out().unwrap();
        chunk[..5].copy_from_slice(b"hello");
        let ptr = chunk.as_ptr();
        pool.check_in(chunk);

        // Contents are not zeroed between loans; the region comes back.
        let seen: Vec<_> = (0..2)
            .map(|_| pool.check_out().unwrap())
            .collect();
        assert!(seen.iter().any(|c| c.as_ptr() == ptr));
        for chunk in seen {
            pool.check_in(chunk);
        }
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "not a full pool chunk")]
    fn test_foreign_buffer_rejected() {
        let pool = BufferPool::new(64, 1);
        pool.check_in(BytesMut::zeroed(64));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "not a full pool chunk")]
    fn test_partial_return_rejected() {
        let pool = BufferPool::new(64, 1);
        let mut chunk = pool.check_out().unwrap();
        let _front = chunk.split_to(16);
        pool.check_in(chunk);
    }
}
