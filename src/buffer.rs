//! Reference-counted byte chunks.
//!
//! # Ownership
//! Every `BufferHandle` value is one logical owner of the underlying bytes.
//! `retain()` hands out another owner (refcount + 1) and dropping a handle
//! releases it (refcount - 1). A chunk moving from the network into a body
//! stream is retained once for the transfer, the network then drops its own
//! handle, and the consumer (or the stream on disposal) drops the transferred one.
//!
//! A `BufferLedger` can be attached at allocation time to count retains and
//! releases across the whole pipeline.

use bytes::Bytes;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts retains and releases of every handle allocated against it.
///
/// The initial allocation counts as a retain, so a fully released ledger
/// always has `retains() == releases()`.
#[derive(Debug, Default)]
pub struct BufferLedger {
    retains: AtomicUsize,
    releases: AtomicUsize,
    freed: AtomicUsize,
}

impl BufferLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Total retains, including initial allocations.
    pub fn retains(&self) -> usize {
        self.retains.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// Number of chunks whose refcount reached zero.
    pub fn freed(&self) -> usize {
        self.freed.load(Ordering::SeqCst)
    }

    /// Outstanding owners across all tracked chunks.
    pub fn outstanding(&self) -> usize {
        self.retains().saturating_sub(self.releases())
    }
}

struct Chunk {
    bytes: Bytes,
    refcnt: AtomicUsize,
    ledger: Option<Arc<BufferLedger>>,
}

/// An owned reference to a shared, immutable byte chunk.
pub struct BufferHandle {
    chunk: Arc<Chunk>,
}

impl BufferHandle {
    /// Allocate a chunk with a refcount of one.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self::allocate(bytes.into(), None)
    }

    /// Allocate a chunk whose retains and releases are recorded in `ledger`.
    pub fn tracked(bytes: impl Into<Bytes>, ledger: &Arc<BufferLedger>) -> Self {
        Self::allocate(bytes.into(), Some(Arc::clone(ledger)))
    }

    fn allocate(bytes: Bytes, ledger: Option<Arc<BufferLedger>>) -> Self {
        if let Some(ledger) = &ledger {
            ledger.retains.fetch_add(1, Ordering::SeqCst);
        }
        Self {
            chunk: Arc::new(Chunk {
                bytes,
                refcnt: AtomicUsize::new(1),
                ledger,
            }),
        }
    }

    /// Take another ownership of the same chunk.
    pub fn retain(&self) -> Self {
        self.chunk.refcnt.fetch_add(1, Ordering::SeqCst);
        if let Some(ledger) = &self.chunk.ledger {
            ledger.retains.fetch_add(1, Ordering::SeqCst);
        }
        Self {
            chunk: Arc::clone(&self.chunk),
        }
    }

    /// Give up this ownership. Equivalent to dropping the handle.
    pub fn release(self) {}

    /// Current number of owners of the chunk.
    pub fn ref_count(&self) -> usize {
        self.chunk.refcnt.load(Ordering::SeqCst)
    }

    pub fn bytes(&self) -> &Bytes {
        &self.chunk.bytes
    }

    /// Cheap copy of the bytes that outlives this handle.
    pub fn to_bytes(&self) -> Bytes {
        self.chunk.bytes.clone()
    }

    pub fn len(&self) -> usize {
        self.chunk.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunk.bytes.is_empty()
    }
}

impl Clone for BufferHandle {
    fn clone(&self) -> Self {
        self.retain()
    }
}

impl Drop for BufferHandle {
    fn drop(&mut self) {
        let previous = self.chunk.refcnt.fetch_sub(1, Ordering::SeqCst);
        if let Some(ledger) = &self.chunk.ledger {
            ledger.releases.fetch_add(1, Ordering::SeqCst);
            if previous == 1 {
                ledger.freed.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}

impl Deref for BufferHandle {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.chunk.bytes
    }
}

impl AsRef<[u8]> for BufferHandle {
    fn as_ref(&self) -> &[u8] {
        &self.chunk.bytes
    }
}

impl fmt::Debug for BufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferHandle")
            .field("len", &self.len())
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

/// Size an item contributes to a stream's cache high-water mark.
pub trait Weighted {
    fn weight(&self) -> usize;
}

impl Weighted for BufferHandle {
    fn weight(&self) -> usize {
        self.len()
    }
}

impl Weighted for Bytes {
    fn weight(&self) -> usize {
        self.len()
    }
}

impl Weighted for Vec<u8> {
    fn weight(&self) -> usize {
        self.len()
    }
}
