//! Request/response logging middleware.
//!
//! For every request [`HttpLogger`] emits exactly two lines at the configured
//! level, correlated by a random request id:
//!
//! ```text
//! [Request  qV3n…==] [path]: /users/42 , [method]: POST , [client ip]: 10.0.0.7 , [params]: [id=42] , [query]: v=1 , [data]: {"a":1}
//! [Response qV3n…==] [path]: /users/42 , [method]: POST , [latency]: 3 ms, [status]: 200  , [data]: {"ok":true}
//! ```
//!
//! Header and body capture are opt-in (see [`LogConfig`]). Captured bytes
//! live in buffers borrowed from a shared [`BufferPool`]; each buffer is owned
//! by a [`PooledStream`] local to the request's future, so it goes back to
//! the pool when that future finishes, unwinds from a panic, or is dropped.

use std::borrow::Cow;
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE;
use http::{HeaderMap, Method, StatusCode};
use rand::RngCore;
use rand::rngs::OsRng;
use tracing::{debug, error, info, warn};

use super::config::{LogConfig, LogConfigBuilder, LogLevel};
use super::tee::ResponseTee;
use super::{Middleware, Next};
use crate::body;
use crate::handler::BoxFuture;
use crate::pool::{BufferPool, PooledStream};
use crate::request::{Params, Request};
use crate::writer::ResponseWriter;

/// Random bytes per request id.
const REQUEST_ID_LEN: usize = 16;

const TRUNCATED: &str = "...(truncated)";

/// Logs one line before and one line after each request.
///
/// Cheap to clone: clones share the same buffer pool.
#[derive(Clone, Debug)]
pub struct HttpLogger {
    config: LogConfig,
    pool: Arc<BufferPool>,
}

impl HttpLogger {
    /// A logger drawing buffers from the process-wide pool.
    pub fn new(config: LogConfig) -> Self {
        Self::with_pool(config, BufferPool::global())
    }

    pub fn with_pool(config: LogConfig, pool: Arc<BufferPool>) -> Self {
        Self { config, pool }
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    /// Derives a logger with some settings overridden, e.g. for one route.
    /// `self` is left untouched and the pool is shared.
    ///
    /// ```rust
    /// # use astor_httplog::middleware::{HttpLogger, LogConfig};
    /// let global = HttpLogger::new(LogConfig::default());
    /// let uploads = global.clone_with(|c| c.request_body(true).max_body_capture(1024));
    /// assert!(!global.config().request_body);
    /// assert!(uploads.config().request_body);
    /// ```
    pub fn clone_with(&self, overrides: impl FnOnce(LogConfigBuilder) -> LogConfigBuilder) -> Self {
        let config = overrides(LogConfigBuilder::from(self.config.clone())).build();
        Self { config, pool: Arc::clone(&self.pool) }
    }

    /// Type-erased handle, for code that keeps middleware in a list.
    pub fn layer(&self) -> Arc<dyn Middleware> {
        Arc::new(self.clone())
    }

    fn output(&self, line: &str) {
        match self.config.level {
            LogLevel::Debug => debug!("{line}"),
            LogLevel::Info => info!("{line}"),
            LogLevel::Warn => warn!("{line}"),
            LogLevel::Error | LogLevel::Panic | LogLevel::Fatal => error!("{line}"),
        }
    }

    /// Serializes `headers` into a pooled buffer, if header logging is on.
    fn capture_headers(&self, enabled: bool, headers: &HeaderMap) -> Option<PooledStream> {
        enabled.then(|| {
            let mut buf = PooledStream::new(&self.pool);
            write_headers(&mut buf, headers);
            buf
        })
    }
}

impl Middleware for HttpLogger {
    fn handle<'a>(
        &'a self,
        mut req: Request,
        w: &'a mut dyn ResponseWriter,
        next: Next<'a>,
    ) -> BoxFuture<'a> {
        Box::pin(async move {
            let start = Instant::now();
            let mut snapshot = RequestSnapshot::of(&req);

            let req_headers = self.capture_headers(self.config.request_header, req.headers());
            snapshot.headers = rendered(req_headers.as_ref());

            if self.config.request_body {
                let (replay, captured) =
                    body::capture(req.take_body(), &self.pool, self.config.max_body_capture).await;
                if let Some(err) = &captured.error {
                    warn!(request_id = %snapshot.id, "request body capture failed: {err}");
                }
                // The handler reads the replay; the original stream is spent.
                req.replace_body(replay);
                let mut text = captured.text;
                if captured.truncated {
                    text.push_str(TRUNCATED);
                }
                snapshot.body = Some(text);
            }

            self.output(&snapshot.to_string());

            let mut tee = None;
            let writer: &mut dyn ResponseWriter = if self.config.response_body {
                tee.insert(ResponseTee::new(w, &self.pool).with_limit(self.config.max_body_capture))
            } else {
                w
            };
            next.run(req, &mut *writer).await;

            let latency = start.elapsed();
            let status = writer.status();
            let resp_headers = self.capture_headers(self.config.response_header, writer.headers());
            let capture = ResponseCapture {
                status,
                latency,
                headers: rendered(resp_headers.as_ref()),
                body: tee.as_ref().map(|t| {
                    let mut text = String::from_utf8_lossy(t.body()).into_owned();
                    if t.is_truncated() {
                        text.push_str(TRUNCATED);
                    }
                    text
                }),
            };

            self.output(&capture.line(&snapshot));
            // `req_headers`, `resp_headers` and `tee` return their buffers here.
        })
    }
}

/// Request metadata taken before dispatch.
#[derive(Clone, Debug, Default)]
pub struct RequestSnapshot {
    pub id: String,
    pub method: Method,
    pub path: String,
    pub client_ip: String,
    pub params: Params,
    pub query: String,
    /// Rendered `, [header]: …` fragment; empty when header logging is off.
    pub headers: String,
    pub body: Option<String>,
}

impl RequestSnapshot {
    fn of(req: &Request) -> Self {
        Self {
            id: request_id(),
            method: req.method().clone(),
            path: req.path().to_owned(),
            client_ip: req.client_ip().map(|ip| ip.to_string()).unwrap_or_default(),
            params: req.params().clone(),
            query: req.query().unwrap_or_default().to_owned(),
            headers: String::new(),
            body: None,
        }
    }
}

impl std::fmt::Display for RequestSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[Request  {}] [path]: {} , [method]: {} , [client ip]: {} {}, [params]: {} , [query]: {}",
            self.id, self.path, self.method, self.client_ip, self.headers, self.params, self.query,
        )?;
        if let Some(body) = &self.body {
            write!(f, " , [data]: {body}")?;
        }
        Ok(())
    }
}

/// Response metadata taken after dispatch.
#[derive(Clone, Debug)]
pub struct ResponseCapture {
    pub status: StatusCode,
    pub latency: Duration,
    /// Rendered `, [header]: …` fragment; empty when header logging is off.
    pub headers: String,
    /// Captured body including its ` , [data]: ` preamble.
    pub body: Option<String>,
}

impl ResponseCapture {
    fn line(&self, req: &RequestSnapshot) -> String {
        format!(
            "[Response {}] [path]: {} , [method]: {} , [latency]: {} ms, [status]: {} {}{}",
            req.id,
            req.path,
            req.method,
            self.latency.as_millis(),
            self.status.as_u16(),
            self.headers,
            self.body.as_deref().unwrap_or_default(),
        )
    }
}

/// A fresh 16-byte random id, URL-safe base64 encoded.
///
/// Only used to pair the two log lines of one request. If the OS random
/// source fails the id is empty; the request is not affected.
pub fn request_id() -> String {
    let mut bytes = [0u8; REQUEST_ID_LEN];
    match OsRng.try_fill_bytes(&mut bytes) {
        Ok(()) => URL_SAFE.encode(bytes),
        Err(_) => String::new(),
    }
}

fn rendered(buf: Option<&PooledStream>) -> String {
    buf.map(|b| String::from_utf8_lossy(b.as_bytes()))
        .map(Cow::into_owned)
        .unwrap_or_default()
}

/// `, [header]: name=v1,v2 other=v  `
///
/// Write errors only lose log detail and are ignored.
fn write_headers(out: &mut impl Write, headers: &HeaderMap) {
    let _ = out.write_all(b", [header]: ");
    if headers.is_empty() {
        return;
    }
    for name in headers.keys() {
        let _ = write!(out, "{name}=");
        for (i, value) in headers.get_all(name).iter().enumerate() {
            if i > 0 {
                let _ = out.write_all(b",");
            }
            let _ = out.write_all(value.as_bytes());
        }
        let _ = out.write_all(b" ");
    }
    let _ = out.write_all(b" ");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_is_16_bytes_url_safe() {
        let id = request_id();
        assert_eq!(URL_SAFE.decode(&id).unwrap().len(), REQUEST_ID_LEN);
        assert!(!id.contains('+') && !id.contains('/'));
        assert_ne!(id, request_id());
    }

    #[test]
    fn headers_render_multi_values_comma_joined() {
        let mut headers = HeaderMap::new();
        headers.append("accept", "text/html".parse().unwrap());
        headers.append("accept", "application/json".parse().unwrap());
        headers.insert("x-id", "7".parse().unwrap());

        let mut out = Vec::new();
        write_headers(&mut out, &headers);
        let out = String::from_utf8(out).unwrap();

        assert!(out.starts_with(", [header]: "));
        assert!(out.contains("accept=text/html,application/json "));
        assert!(out.contains("x-id=7 "));
        assert!(out.ends_with("  "));
    }

    #[test]
    fn empty_headers_render_label_only() {
        let mut out = Vec::new();
        write_headers(&mut out, &HeaderMap::new());
        assert_eq!(out, b", [header]: ");
    }

    #[test]
    fn lines_follow_the_access_log_layout() {
        let snapshot = RequestSnapshot {
            id: "ID".into(),
            method: Method::POST,
            path: "/users/42".into(),
            client_ip: "10.0.0.7".into(),
            params: [("id".to_owned(), "42".to_owned())].into_iter().collect(),
            query: "v=1".into(),
            headers: String::new(),
            body: Some(r#"{"a":1}"#.into()),
        };
        assert_eq!(
            snapshot.to_string(),
            r#"[Request  ID] [path]: /users/42 , [method]: POST , [client ip]: 10.0.0.7 , [params]: [id=42] , [query]: v=1 , [data]: {"a":1}"#
        );

        let capture = ResponseCapture {
            status: StatusCode::CREATED,
            latency: Duration::from_millis(12),
            headers: String::new(),
            body: Some(" , [data]: ok".into()),
        };
        assert_eq!(
            capture.line(&snapshot),
            "[Response ID] [path]: /users/42 , [method]: POST , [latency]: 12 ms, [status]: 201  , [data]: ok"
        );
    }

    #[test]
    fn clone_with_leaves_source_untouched() {
        let pool = Arc::new(BufferPool::default());
        let base = HttpLogger::with_pool(LogConfig::default(), Arc::clone(&pool));
        let derived = base.clone_with(|c| c.response_body(true).level(LogLevel::Debug));

        assert_eq!(base.config(), &LogConfig::default());
        assert!(derived.config().response_body);
        assert_eq!(derived.config().level, LogLevel::Debug);
        assert!(Arc::ptr_eq(base.pool(), derived.pool()));
    }
}
