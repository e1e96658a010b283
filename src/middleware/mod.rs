//! Middleware layer.
//!
//! Middleware intercepts requests and responses and is the right place for
//! cross-cutting concerns: request logging, panic recovery, request-id
//! injection, authentication-header inspection.
//!
//! A middleware receives the request by value, the response as a
//! [`ResponseWriter`], and a [`Next`] that runs the rest of the chain. It may
//! replace the request body, wrap the writer, or skip `next` entirely.
//!
//! ```text
//! global layers → route layers → handler → response.write_into(writer)
//! ```
//!
//! Built-in middleware:
//! - [`HttpLogger`] — one line before and one line after every request, with
//!   optional header and body capture through pooled buffers
//! - [`Recover`] — turns a handler panic into `500 Internal Server Error`

mod config;
mod logger;
mod recover;
mod tee;

use std::sync::Arc;

use crate::handler::{BoxFuture, BoxedHandler};
use crate::request::Request;
use crate::writer::ResponseWriter;

pub use config::{LogConfig, LogConfigBuilder, LogLevel, DEFAULT_MAX_BODY_CAPTURE};
pub use logger::{HttpLogger, RequestSnapshot, ResponseCapture, request_id};
pub use recover::Recover;
pub use tee::ResponseTee;

/// A step in the request pipeline.
///
/// Implementations must call `next.run` at most once.
pub trait Middleware: Send + Sync + 'static {
    fn handle<'a>(
        &'a self,
        req: Request,
        w: &'a mut dyn ResponseWriter,
        next: Next<'a>,
    ) -> BoxFuture<'a>;
}

impl<M: Middleware + ?Sized> Middleware for Arc<M> {
    fn handle<'a>(
        &'a self,
        req: Request,
        w: &'a mut dyn ResponseWriter,
        next: Next<'a>,
    ) -> BoxFuture<'a> {
        (**self).handle(req, w, next)
    }
}

/// The remainder of the chain after the current middleware.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    global: &'a [Arc<dyn Middleware>],
    route: &'a [Arc<dyn Middleware>],
    endpoint: &'a BoxedHandler,
}

impl<'a> Next<'a> {
    pub(crate) fn new(
        global: &'a [Arc<dyn Middleware>],
        route: &'a [Arc<dyn Middleware>],
        endpoint: &'a BoxedHandler,
    ) -> Self {
        Self { global, route, endpoint }
    }

    /// Runs the rest of the chain against `req`, writing into `w`.
    ///
    /// `w` may be a different writer from the one this middleware received,
    /// e.g. a [`ResponseTee`] wrapping it.
    pub fn run<'w>(self, req: Request, w: &'w mut dyn ResponseWriter) -> BoxFuture<'w>
    where
        'a: 'w,
    {
        if let Some((head, global)) = self.global.split_first() {
            return head.handle(req, w, Next { global, ..self });
        }
        if let Some((head, route)) = self.route.split_first() {
            return head.handle(req, w, Next { route, ..self });
        }
        let fut = self.endpoint.call(req);
        Box::pin(async move { fut.await.write_into(w) })
    }
}
