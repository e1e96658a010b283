//! Request-scoped buffer recycling.
//!
//! [`BufferPool`] hands out empty `BytesMut` buffers and takes them back;
//! [`PooledStream`] ties one borrowed buffer to a scope so it is returned on
//! every exit path, including panics and cancelled futures.

mod buffer;
mod stream;

pub use buffer::{
    BufferPool, DEFAULT_INITIAL_CAPACITY, DEFAULT_MAX_POOLED, DEFAULT_MAX_SIZE, PoolConfig,
    PoolEvent, PoolObserver, PoolStats, TracingObserver,
};
pub use stream::PooledStream;
