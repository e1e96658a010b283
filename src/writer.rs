//! The response writer handed down the middleware chain.
//!
//! Middleware sees the outgoing response as a [`ResponseWriter`], not as a
//! value it has to return. That lets a decorator such as
//! [`ResponseTee`](crate::middleware::ResponseTee) wrap the writer and observe
//! every byte on its way out without the handler knowing.

use std::io;

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;

/// Everything a middleware or handler may do to the outgoing response.
///
/// Decorators implement this by delegation and must forward every method,
/// not just the ones they intercept.
pub trait ResponseWriter: Send {
    fn status(&self) -> StatusCode;
    fn set_status(&mut self, status: StatusCode);
    fn headers(&self) -> &HeaderMap;
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Appends body bytes. Returns how many were accepted.
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    fn write_str(&mut self, s: &str) -> io::Result<usize> {
        self.write(s.as_bytes())
    }

    /// Body bytes written so far.
    fn written(&self) -> usize;

    /// Discards everything written so far: status back to `200 OK`, no
    /// headers, no body.
    fn reset(&mut self);
}

/// The writer at the bottom of every chain: what it holds is what the client
/// receives.
#[derive(Debug)]
pub struct BufferedWriter {
    status: StatusCode,
    headers: HeaderMap,
    body: BytesMut,
}

impl BufferedWriter {
    /// Starts as `200 OK` with no headers and no body.
    pub fn new() -> Self {
        Self { status: StatusCode::OK, headers: HeaderMap::new(), body: BytesMut::new() }
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Converts into the response hyper sends on the wire.
    pub fn into_response(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(self.body.freeze()));
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }
}

impl Default for BufferedWriter {
    fn default() -> Self { Self::new() }
}

impl ResponseWriter for BufferedWriter {
    fn status(&self) -> StatusCode { self.status }
    fn set_status(&mut self, status: StatusCode) { self.status = status; }
    fn headers(&self) -> &HeaderMap { &self.headers }
    fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.body.extend_from_slice(data);
        Ok(data.len())
    }

    fn written(&self) -> usize { self.body.len() }

    fn reset(&mut self) {
        self.status = StatusCode::OK;
        self.headers.clear();
        self.body.clear();
    }
}

#[cfg(test)]
mod tests {
    use http::header::CONTENT_TYPE;

    use super::*;

    #[test]
    fn buffered_writer_becomes_http_response() {
        let mut w = BufferedWriter::new();
        w.set_status(StatusCode::CREATED);
        w.headers_mut().insert(CONTENT_TYPE, "text/plain".parse().unwrap());
        w.write(b"hello ").unwrap();
        w.write_str("world").unwrap();
        assert_eq!(w.written(), 11);

        let res = w.into_response();
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(res.headers()[CONTENT_TYPE], "text/plain");
    }

    #[test]
    fn reset_discards_partial_response() {
        let mut w = BufferedWriter::new();
        w.set_status(StatusCode::ACCEPTED);
        w.headers_mut().insert(CONTENT_TYPE, "text/plain".parse().unwrap());
        w.write(b"half").unwrap();

        w.reset();
        assert_eq!(w.status(), StatusCode::OK);
        assert!(w.headers().is_empty());
        assert_eq!(w.written(), 0);
    }
}
