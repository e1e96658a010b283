//! Request body type.
//!
//! An inbound body can be read exactly once. To log it *and* hand it to the
//! real handler, [`capture`] drains the original stream into a pooled buffer
//! and returns a replay body that yields the same bytes again. Handlers never
//! see the difference: every variant implements [`http_body::Body`].

use std::io::Write;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use http::HeaderMap;
use http_body::{Body as HttpBody, Frame, SizeHint};
use http_body_util::BodyExt;
use http_body_util::combinators::UnsyncBoxBody;
use hyper::body::Incoming;

use crate::pool::{BufferPool, PooledStream};

/// Boxed error yielded by [`Body`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Largest data frame produced when replaying a captured body.
const REPLAY_CHUNK: usize = 16 * 1024;

/// The body of a [`Request`](crate::Request).
pub struct Body {
    kind: Kind,
}

enum Kind {
    Empty,
    Full(Option<Bytes>),
    Incoming(Incoming),
    Boxed(UnsyncBoxBody<Bytes, BoxError>),
    Replay(Box<Replay>),
}

/// Captured prefix, then whatever the original stream had left.
struct Replay {
    captured: PooledStream,
    trailers: Option<HeaderMap>,
    error: Option<BoxError>,
    rest: Option<Body>,
}

impl Body {
    pub fn empty() -> Self {
        Self { kind: Kind::Empty }
    }

    /// Wraps any body producing `Bytes` frames.
    pub fn new<B>(body: B) -> Self
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        Self { kind: Kind::Boxed(body.map_err(Into::<BoxError>::into).boxed_unsync()) }
    }

    /// Reads the remaining body to the end.
    pub async fn collect_bytes(self) -> Result<Bytes, BoxError> {
        Ok(self.collect().await?.to_bytes())
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Incoming> for Body {
    fn from(incoming: Incoming) -> Self {
        Self { kind: Kind::Incoming(incoming) }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self { kind: Kind::Full(Some(bytes)) }
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Bytes::from(bytes).into()
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Bytes::from(s).into()
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self {
        Bytes::from_static(s.as_bytes()).into()
    }
}

impl HttpBody for Body {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, BoxError>>> {
        match &mut self.get_mut().kind {
            Kind::Empty => Poll::Ready(None),
            Kind::Full(data) => Poll::Ready(data.take().map(|d| Ok(Frame::data(d)))),
            Kind::Incoming(incoming) => Pin::new(incoming).poll_frame(cx).map_err(Into::into),
            Kind::Boxed(body) => Pin::new(body).poll_frame(cx),
            Kind::Replay(replay) => replay.poll_frame(cx),
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.kind {
            Kind::Empty => true,
            Kind::Full(data) => data.is_none(),
            Kind::Incoming(incoming) => incoming.is_end_stream(),
            Kind::Boxed(body) => body.is_end_stream(),
            Kind::Replay(replay) => {
                replay.captured.content_length() == 0
                    && replay.trailers.is_none()
                    && replay.error.is_none()
                    && replay.rest.as_ref().is_none_or(|rest| rest.is_end_stream())
            }
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.kind {
            Kind::Empty => SizeHint::with_exact(0),
            Kind::Full(data) => SizeHint::with_exact(data.as_ref().map_or(0, |d| d.len() as u64)),
            Kind::Incoming(incoming) => incoming.size_hint(),
            Kind::Boxed(body) => body.size_hint(),
            Kind::Replay(replay) => {
                let captured = replay.captured.content_length();
                let rest = replay.rest.as_ref().map_or_else(|| SizeHint::with_exact(0), |r| r.size_hint());
                let mut hint = SizeHint::new();
                hint.set_lower(captured + rest.lower());
                if let Some(upper) = rest.upper() {
                    hint.set_upper(captured + upper);
                }
                hint
            }
        }
    }
}

impl Replay {
    fn poll_frame(&mut self, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Bytes>, BoxError>>> {
        if let Some(chunk) = self.captured.next_chunk(REPLAY_CHUNK) {
            return Poll::Ready(Some(Ok(Frame::data(chunk))));
        }
        // Fully replayed: the buffer can go back before the handler finishes.
        self.captured.close();

        if let Some(err) = self.error.take() {
            return Poll::Ready(Some(Err(err)));
        }
        if let Some(rest) = &mut self.rest {
            match ready!(Pin::new(rest).poll_frame(cx)) {
                None => self.rest = None,
                frame => return Poll::Ready(frame),
            }
        }
        Poll::Ready(self.trailers.take().map(|t| Ok(Frame::trailers(t))))
    }
}

/// Result of [`capture`]: what to log, and whether it is the whole body.
#[derive(Debug)]
pub(crate) struct Captured {
    pub(crate) text: String,
    pub(crate) truncated: bool,
    pub(crate) error: Option<String>,
}

/// Drains `body` into a pooled buffer until `limit` bytes are captured or the
/// stream ends, and returns a body that replays everything the original
/// would have produced.
///
/// The original stream is dropped once it reaches its end. If it is longer
/// than `limit`, the frame that crosses the limit is kept with the capture
/// and the remainder is chained behind it instead,
/// so the handler still receives every byte. A read error ends the capture
/// early; the replay body yields the captured prefix and then that error.
pub(crate) async fn capture(mut body: Body, pool: &Arc<BufferPool>, limit: usize) -> (Body, Captured) {
    let mut captured = PooledStream::new(pool);
    let mut trailers = None;
    let mut error = None;
    let mut finished = false;
    let mut peeked = false;

    loop {
        // At the limit, read one frame past it: a stream of unknown length
        // that ends exactly at the limit is complete, not truncated.
        let full = captured.content_length() as usize >= limit;
        if full && (peeked || body.is_end_stream()) {
            break;
        }
        peeked = full;

        match body.frame().await {
            Some(Ok(frame)) => match frame.into_data() {
                Ok(data) => {
                    let _ = captured.write_all(&data);
                }
                Err(frame) => {
                    if let Ok(t) = frame.into_trailers() {
                        trailers = Some(t);
                    }
                }
            },
            Some(Err(err)) => {
                error = Some(err);
                finished = true;
                break;
            }
            None => {
                finished = true;
                break;
            }
        }
    }
    let finished = finished || body.is_end_stream();

    let bytes = captured.as_bytes();
    let shown = bytes.len().min(limit);
    let summary = Captured {
        text: String::from_utf8_lossy(&bytes[..shown]).into_owned(),
        truncated: !finished || shown < bytes.len(),
        error: error.as_ref().map(ToString::to_string),
    };

    let replay = Replay {
        captured,
        trailers,
        error,
        rest: if finished { None } else { Some(body) },
    };
    (Body { kind: Kind::Replay(Box::new(replay)) }, summary)
}
