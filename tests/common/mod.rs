//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex};

use astor_httplog::pool::BufferPool;
use astor_httplog::{Body, BufferedWriter, Request, Router};
use http::Method;

/// In-memory sink for a `tracing-subscriber` fmt layer.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LogBuffer {
    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .lines()
            .map(str::to_owned)
            .collect()
    }

    /// Lines containing `needle`.
    pub fn matching(&self, needle: &str) -> Vec<String> {
        self.lines().into_iter().filter(|l| l.contains(needle)).collect()
    }
}

pub fn subscriber(logs: &LogBuffer) -> impl tracing::Subscriber + Send + Sync + 'static {
    let logs = logs.clone();
    tracing_subscriber::fmt()
        .with_writer(move || logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish()
}

pub fn request(method: Method, uri: &str, body: impl Into<Body>) -> Request {
    let req = http::Request::builder().method(method).uri(uri).body(body.into()).unwrap();
    Request::new(req).with_remote_addr("192.0.2.10:40000".parse().unwrap())
}

pub async fn send(router: &Router, req: Request) -> BufferedWriter {
    let mut w = BufferedWriter::new();
    router.handle(req, &mut w).await;
    w
}

/// Every buffer handed out by the pool has come back (or was discarded).
pub fn assert_all_released(pool: &BufferPool) {
    let stats = pool.stats();
    assert_eq!(
        stats.hits + stats.misses,
        stats.returns + stats.discards,
        "outstanding pooled buffers: {stats:?}"
    );
}

/// The id between `[Request  ` / `[Response ` and the closing bracket.
pub fn request_id(line: &str) -> &str {
    let start = line
        .find("[Request  ")
        .map(|i| i + "[Request  ".len())
        .or_else(|| line.find("[Response ").map(|i| i + "[Response ".len()))
        .expect("not an access log line");
    let end = start + line[start..].find(']').unwrap();
    &line[start..end]
}
