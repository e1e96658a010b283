//! Read-write-close adapter over one pooled buffer.

use std::io::{self, Read, Write};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};

use super::buffer::BufferPool;

/// A single-use stream backed by exactly one buffer borrowed from a
/// [`BufferPool`].
///
/// Used both to accumulate logged bytes and, when the request body is
/// captured, as the replayable body handed to the real handler.
///
/// The buffer goes back to the pool exactly once: on the first
/// [`close`](PooledStream::close) or, failing that, on drop. After close,
/// reads report end-of-stream and writes fail with `BrokenPipe`.
pub struct PooledStream {
    pool: Arc<BufferPool>,
    buf: Option<BytesMut>,
    pos: usize,
}

impl PooledStream {
    pub fn new(pool: &Arc<BufferPool>) -> Self {
        Self { buf: Some(pool.get()), pool: Arc::clone(pool), pos: 0 }
    }

    /// Unread content, without consuming it.
    pub fn as_bytes(&self) -> &[u8] {
        match &self.buf {
            Some(buf) => &buf[self.pos..],
            None => &[],
        }
    }

    /// Number of unread bytes.
    pub fn content_length(&self) -> u64 {
        self.as_bytes().len() as u64
    }

    pub fn is_closed(&self) -> bool {
        self.buf.is_none()
    }

    /// Releases the buffer to the pool. Later calls are no-ops.
    pub fn close(&mut self) {
        self.pool.put_opt(self.buf.take());
    }

    /// Drops all content but keeps the buffer. No-op once closed.
    pub fn reset(&mut self) {
        if let Some(buf) = &mut self.buf {
            buf.clear();
        }
        self.pos = 0;
    }

    /// Consumes up to `max` unread bytes as an owned chunk.
    pub(crate) fn next_chunk(&mut self, max: usize) -> Option<Bytes> {
        let unread = self.as_bytes();
        if unread.is_empty() {
            return None;
        }
        let n = unread.len().min(max);
        let chunk = Bytes::copy_from_slice(&unread[..n]);
        self.pos += n;
        Some(chunk)
    }
}

impl Read for PooledStream {
    fn read(&mut self, into: &mut [u8]) -> io::Result<usize> {
        let unread = self.as_bytes();
        let n = unread.len().min(into.len());
        into[..n].copy_from_slice(&unread[..n]);
        self.pos += n;
        Ok(n)
    }
}

impl Write for PooledStream {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        match &mut self.buf {
            Some(buf) => {
                buf.extend_from_slice(data);
                Ok(data.len())
            }
            None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "pooled stream closed")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for PooledStream {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for PooledStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledStream")
            .field("unread", &self.content_length())
            .field("closed", &self.is_closed())
            .finish()
    }
}
