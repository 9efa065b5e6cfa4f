//! Fixed-size scratch buffers shared by all in-flight evaluations.
//!
//! `acquire` never fails: it pops a free buffer or allocates a new one.
//! Release is tied to `Drop` of the returned guard, so a buffer goes back
//! exactly once on every path, early returns and panics included.
//! Contents are never cleared; callers track the valid length themselves.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Capacity of every pooled buffer.
pub const BUFFER_SIZE: usize = 8192;

/// Snapshot of pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub acquired: u64,
    pub released: u64,
    pub allocated: u64,
    pub idle: usize,
}

impl PoolStats {
    /// Buffers handed out and not yet returned.
    pub fn outstanding(&self) -> u64 {
        self.acquired.saturating_sub(self.released)
    }
}

#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    free: Mutex<Vec<Box<[u8]>>>,
    max_idle: usize,
    acquired: AtomicU64,
    released: AtomicU64,
    allocated: AtomicU64,
}

impl BufferPool {
    /// `max_idle` caps the free list; extra releases are deallocated.
    pub fn new(max_idle: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(Vec::with_capacity(max_idle)),
                max_idle,
                acquired: AtomicU64::new(0),
                released: AtomicU64::new(0),
                allocated: AtomicU64::new(0),
            }),
        }
    }

    pub fn acquire(&self) -> PooledBuffer {
        // Poisoned free list: fall back to a fresh allocation.
        let reused = self.inner.free.lock().ok().and_then(|mut free| free.pop());
        let buf = match reused {
            Some(buf) => buf,
            None => {
                self.inner.allocated.fetch_add(1, Ordering::Relaxed);
                vec![0u8; BUFFER_SIZE].into_boxed_slice()
            }
        };
        self.inner.acquired.fetch_add(1, Ordering::Relaxed);

        PooledBuffer {
            buf: Some(buf),
            pool: Arc::clone(&self.inner),
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            acquired: self.inner.acquired.load(Ordering::Acquire),
            released: self.inner.released.load(Ordering::Acquire),
            allocated: self.inner.allocated.load(Ordering::Acquire),
            idle: self.inner.free.lock().map(|f| f.len()).unwrap_or(0),
        }
    }

    pub fn outstanding(&self) -> u64 {
        self.stats().outstanding()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(64)
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("max_idle", &self.inner.max_idle)
            .field("stats", &self.stats())
            .finish()
    }
}

impl PoolInner {
    fn release(&self, buf: Box<[u8]>) {
        self.released.fetch_add(1, Ordering::AcqRel);
        if let Ok(mut free) = self.free.lock() {
            if free.len() < self.max_idle {
                free.push(buf);
            }
        }
    }
}

/// Scoped buffer lease. Dropping it returns the buffer to its pool.
pub struct PooledBuffer {
    buf: Option<Box<[u8]>>,
    pool: Arc<PoolInner>,
}

impl PooledBuffer {
    /// Return the buffer now instead of at end of scope.
    pub fn release(self) {}

    pub fn capacity(&self) -> usize {
        self.buf.as_ref().map(|b| b.len()).unwrap_or(0)
    }
}

impl Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or_default()
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().unwrap_or_default()
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(buf);
        }
    }
}

impl fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("capacity", &self.capacity())
            .finish()
    }
}
