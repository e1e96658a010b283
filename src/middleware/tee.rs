//! Response body capture.
//!
//! [`ResponseTee`] sits between the chain and the real writer. The client's
//! bytes are never touched; the logger only reads the copy.

use std::io::{self, Write};
use std::sync::Arc;

use http::{HeaderMap, StatusCode};

use crate::pool::{BufferPool, PooledStream};
use crate::writer::ResponseWriter;

/// Text placed in front of the captured body, so [`ResponseTee::body`] can be
/// appended to a log line as is.
pub(crate) const BODY_PREAMBLE: &str = " , [data]: ";

/// A [`ResponseWriter`] decorator that keeps a copy of the body.
///
/// Each write goes to a pooled capture buffer first and then, unchanged, to
/// the wrapped writer. Capture failures are ignored; the result the caller
/// sees is always the real writer's. Status and header access are forwarded.
///
/// The copy holds at most `limit` body bytes (see
/// [`with_limit`](ResponseTee::with_limit)); the client always gets all of
/// them.
pub struct ResponseTee<'w> {
    inner: &'w mut dyn ResponseWriter,
    capture: PooledStream,
    limit: usize,
    truncated: bool,
}

impl<'w> ResponseTee<'w> {
    pub fn new(inner: &'w mut dyn ResponseWriter, pool: &Arc<BufferPool>) -> Self {
        let mut capture = PooledStream::new(pool);
        let _ = capture.write_all(BODY_PREAMBLE.as_bytes());
        Self { inner, capture, limit: usize::MAX, truncated: false }
    }

    /// Caps the captured copy at `limit` body bytes.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Captured bytes, preamble included.
    pub fn body(&self) -> &[u8] {
        self.capture.as_bytes()
    }

    /// Captured bytes without the preamble.
    pub fn captured(&self) -> &[u8] {
        let body = self.body();
        body.get(BODY_PREAMBLE.len()..).unwrap_or_default()
    }

    /// Whether the body outgrew the capture limit.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Returns the capture buffer to the pool. Also happens on drop.
    pub fn close(&mut self) {
        self.capture.close();
    }

    fn record(&mut self, data: &[u8]) {
        if self.capture.is_closed() {
            return;
        }
        let room = self.limit.saturating_sub(self.captured().len());
        if data.len() > room {
            self.truncated = true;
        }
        let _ = self.capture.write_all(&data[..data.len().min(room)]);
    }
}

impl ResponseWriter for ResponseTee<'_> {
    fn status(&self) -> StatusCode {
        self.inner.status()
    }

    fn set_status(&mut self, status: StatusCode) {
        self.inner.set_status(status);
    }

    fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.record(data);
        self.inner.write(data)
    }

    fn write_str(&mut self, s: &str) -> io::Result<usize> {
        self.record(s.as_bytes());
        self.inner.write_str(s)
    }

    fn written(&self) -> usize {
        self.inner.written()
    }

    fn reset(&mut self) {
        self.inner.reset();
        if !self.capture.is_closed() {
            self.capture.reset();
            let _ = self.capture.write_all(BODY_PREAMBLE.as_bytes());
        }
        self.truncated = false;
    }
}
