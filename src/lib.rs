//! # astor-httplog
//!
//! A minimal HTTP framework for Rust services behind a reverse proxy, with
//! request/response logging that does not get in the handler's way.
//!
//! ## The contract
//!
//! Every request produces two log lines, one before and one after the
//! handler, tied together by a random request id. Headers and bodies can be
//! added to those lines per deployment or per route. Capturing them must not:
//!
//! - **consume the request body** — the handler still reads every byte;
//! - **alter the response** — the client gets exactly what the handler wrote;
//! - **leak buffers** — every capture buffer comes from a shared
//!   [`BufferPool`](pool::BufferPool) and goes back to it, even when the
//!   handler panics or the connection is dropped mid-request.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use astor_httplog::{Request, Response, Router, Server};
//! use astor_httplog::middleware::{HttpLogger, LogConfig, LogLevel, Recover};
//! use http::{Method, StatusCode};
//!
//! #[tokio::main]
//! async fn main() {
//!     let logger = HttpLogger::new(LogConfig::builder().level(LogLevel::Info).build());
//!
//!     let app = Router::new()
//!         .layer(Recover)
//!         .layer(logger.clone())
//!         .on(Method::GET, "/users/{id}", get_user)
//!         .on_with(
//!             Method::POST,
//!             "/users",
//!             logger.clone_with(|c| c.request_body(true).response_body(true)),
//!             create_user,
//!         );
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! async fn get_user(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or("unknown");
//!     Response::json(format!(r#"{{"id":"{id}"}}"#))
//! }
//!
//! async fn create_user(mut req: Request) -> Response {
//!     match req.bytes().await {
//!         Ok(body) if !body.is_empty() => Response::builder()
//!             .status(StatusCode::CREATED)
//!             .header("location", "/users/99")
//!             .json(body),
//!         _ => Response::status(StatusCode::BAD_REQUEST),
//!     }
//! }
//! ```

mod body;
mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;
mod writer;

pub mod middleware;
pub mod pool;

pub use body::{Body, BoxError};
pub use error::Error;
pub use handler::{BoxFuture, Handler};
pub use request::{Params, Request};
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
pub use writer::{BufferedWriter, ResponseWriter};
