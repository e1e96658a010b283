//! Lock-free pool of reusable `BytesMut` buffers.
//!
//! One pool is shared by every in-flight request. A buffer is *moved* out of
//! the free list by [`BufferPool::get`] and moved back by [`BufferPool::put`],
//! so two requests can never hold the same buffer at the same time.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use bytes::BytesMut;
use crossbeam::queue::ArrayQueue;
use serde::Deserialize;
use tracing::trace;

/// Capacity of a freshly allocated buffer.
pub const DEFAULT_INITIAL_CAPACITY: usize = 1024;

/// Buffers longer than this are dropped on `put` instead of being retained.
pub const DEFAULT_MAX_SIZE: usize = 4096;

/// Upper bound on the number of idle buffers kept in the free list.
pub const DEFAULT_MAX_POOLED: usize = 256;

static GLOBAL_POOL: OnceLock<Arc<BufferPool>> = OnceLock::new();

// ── Configuration ─────────────────────────────────────────────────────────────

/// Sizing knobs for a [`BufferPool`].
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PoolConfig {
    /// Capacity reserved for buffers allocated on a pool miss.
    pub initial_capacity: usize,
    /// Largest buffer length that is still worth keeping.
    pub max_size: usize,
    /// Maximum number of idle buffers retained.
    pub max_pooled: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            max_size: DEFAULT_MAX_SIZE,
            max_pooled: DEFAULT_MAX_POOLED,
        }
    }
}

// ── Observer ──────────────────────────────────────────────────────────────────

/// A single pool operation, reported to a [`PoolObserver`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PoolEvent {
    /// A buffer was handed out. `reused` is false on a pool miss.
    Acquire { reused: bool },
    /// A buffer went back into the free list.
    Release,
    /// A buffer was dropped: too large, or the free list was full.
    Discard { len: usize },
}

/// Hook invoked on every acquire/release. Disabled unless installed with
/// [`BufferPool::with_observer`].
pub trait PoolObserver: Send + Sync + 'static {
    fn on_event(&self, event: PoolEvent);
}

/// Observer that traces every pool operation at `TRACE` level.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl PoolObserver for TracingObserver {
    fn on_event(&self, event: PoolEvent) {
        trace!(?event, "buffer pool");
    }
}

// ── Pool ──────────────────────────────────────────────────────────────────────

/// Concurrency-safe cache of growable byte buffers.
///
/// `get` never blocks and never fails: when the free list is empty a new
/// buffer is allocated. `put` bounds the worst-case memory footprint by
/// refusing buffers longer than [`PoolConfig::max_size`].
pub struct BufferPool {
    config: PoolConfig,
    free: ArrayQueue<BytesMut>,
    observer: Option<Arc<dyn PoolObserver>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
    returns: AtomicUsize,
    discards: AtomicUsize,
}

impl BufferPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            free: ArrayQueue::new(config.max_pooled.max(1)),
            config,
            observer: None,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            returns: AtomicUsize::new(0),
            discards: AtomicUsize::new(0),
        }
    }

    /// The process-wide pool, created with [`PoolConfig::default`] on first use.
    pub fn global() -> Arc<BufferPool> {
        Arc::clone(GLOBAL_POOL.get_or_init(|| Arc::new(BufferPool::default())))
    }

    /// Installs an observer notified on every acquire/release.
    pub fn with_observer(mut self, observer: impl PoolObserver) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Borrows an empty buffer with at least `initial_capacity` bytes reserved.
    pub fn get(&self) -> BytesMut {
        let (buf, reused) = match self.free.pop() {
            Some(mut buf) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                // Already cleared by `put`; cleared again so the invariant
                // does not depend on every producer.
                buf.clear();
                if buf.capacity() < self.config.initial_capacity {
                    buf.reserve(self.config.initial_capacity);
                }
                (buf, true)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                (BytesMut::with_capacity(self.config.initial_capacity), false)
            }
        };
        self.notify(PoolEvent::Acquire { reused });
        buf
    }

    /// Returns a buffer for reuse.
    ///
    /// Buffers longer than `max_size` are dropped, as are buffers arriving
    /// while the free list is full. Everything else is cleared (capacity is
    /// kept) and becomes available to the next `get`.
    pub fn put(&self, mut buf: BytesMut) {
        let len = buf.len();
        if len > self.config.max_size {
            self.discard(len);
            return;
        }
        buf.clear();
        match self.free.push(buf) {
            Ok(()) => {
                self.returns.fetch_add(1, Ordering::Relaxed);
                self.notify(PoolEvent::Release);
            }
            Err(_) => self.discard(len),
        }
    }

    /// [`put`](Self::put) for a buffer that may already have been taken.
    pub fn put_opt(&self, buf: Option<BytesMut>) {
        if let Some(buf) = buf {
            self.put(buf);
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            size: self.free.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            returns: self.returns.load(Ordering::Relaxed),
            discards: self.discards.load(Ordering::Relaxed),
        }
    }

    /// Number of idle buffers.
    pub fn len(&self) -> usize {
        self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    fn discard(&self, len: usize) {
        self.discards.fetch_add(1, Ordering::Relaxed);
        self.notify(PoolEvent::Discard { len });
    }

    #[inline]
    fn notify(&self, event: PoolEvent) {
        if let Some(observer) = &self.observer {
            observer.on_event(event);
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

/// Point-in-time counters for a [`BufferPool`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PoolStats {
    /// Idle buffers currently in the free list.
    pub size: usize,
    /// `get` calls served from the free list.
    pub hits: usize,
    /// `get` calls that allocated.
    pub misses: usize,
    /// Buffers accepted back by `put`.
    pub returns: usize,
    /// Buffers dropped by `put`.
    pub discards: usize,
}
