//! Panic recovery.
//!
//! A panicking handler must not take the connection down with it, and must
//! not leave half a response behind.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use http::StatusCode;
use tracing::error;

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;
use crate::writer::ResponseWriter;

/// Converts a panic anywhere further down the chain into
/// `500 Internal Server Error`.
///
/// Anything already written (status, headers, body bytes) is discarded with
/// [`ResponseWriter::reset`] before the 500 goes out.
///
/// Register it as the first global layer so the logger sits inside it: the
/// logger's buffers are released while the panic unwinds, and the client
/// still gets a response.
#[derive(Clone, Copy, Debug, Default)]
pub struct Recover;

impl Middleware for Recover {
    fn handle<'a>(
        &'a self,
        req: Request,
        w: &'a mut dyn ResponseWriter,
        next: Next<'a>,
    ) -> BoxFuture<'a> {
        Box::pin(async move {
            let path = req.path().to_owned();
            let outcome = AssertUnwindSafe(next.run(req, &mut *w)).catch_unwind().await;
            if let Err(panic) = outcome {
                error!(%path, "handler panicked: {}", panic_message(&*panic));
                w.reset();
                Response::status(StatusCode::INTERNAL_SERVER_ERROR).write_into(w);
            }
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic>")
}
