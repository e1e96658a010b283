//! Radix-tree request router.
//!
//! One tree per HTTP method. O(path-length) lookup. Middleware registered with
//! [`Router::layer`] wraps every request, including unmatched ones; middleware
//! given to [`Router::on_with`] wraps a single route, inside the global layers.

use std::collections::HashMap;
use std::sync::Arc;

use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;

use crate::handler::{BoxedHandler, Handler};
use crate::middleware::{Middleware, Next};
use crate::request::{Params, Request};
use crate::response::Response;
use crate::writer::ResponseWriter;

struct Route {
    handler: BoxedHandler,
    layers: Vec<Arc<dyn Middleware>>,
}

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve).
/// Each registration returns `self` so calls chain naturally.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<Route>>,
    layers: Vec<Arc<dyn Middleware>>,
    not_found: BoxedHandler,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            layers: Vec::new(),
            not_found: (|_req: Request| async { Response::status(StatusCode::NOT_FOUND) })
                .into_boxed_handler(),
        }
    }

    /// Register a handler for a method + path pair. Returns `self` for chaining.
    ///
    /// Path parameters use `{name}` syntax — `req.param("name")` retrieves them:
    ///
    /// ```rust,no_run
    /// # use astor_httplog::{Request, Response, Router};
    /// # use http::Method;
    /// # async fn get_user(_: Request) -> Response { Response::text("") }
    /// # async fn create_user(_: Request) -> Response { Response::text("") }
    /// Router::new()
    ///     .on(Method::GET,  "/users/{id}", get_user)
    ///     .on(Method::POST, "/users",      create_user);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route or conflicts with one already
    /// registered for `method`.
    pub fn on(self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.add(method, path, Vec::new(), handler)
    }

    /// Like [`on`](Router::on), with `middleware` wrapping only this route.
    ///
    /// ```rust,no_run
    /// # use astor_httplog::{Request, Response, Router};
    /// # use astor_httplog::middleware::{HttpLogger, LogConfig};
    /// # use http::Method;
    /// # async fn upload(_: Request) -> Response { Response::text("") }
    /// let logger = HttpLogger::new(LogConfig::default());
    /// Router::new()
    ///     .on_with(Method::POST, "/upload", logger.clone_with(|c| c.request_body(true)), upload);
    /// ```
    pub fn on_with(
        self,
        method: Method,
        path: &str,
        middleware: impl Middleware,
        handler: impl Handler,
    ) -> Self {
        let layer: Arc<dyn Middleware> = Arc::new(middleware);
        self.add(method, path, vec![layer], handler)
    }

    /// Wraps every request in `middleware`. Layers run in registration order,
    /// the first one outermost.
    pub fn layer(mut self, middleware: impl Middleware) -> Self {
        self.layers.push(Arc::new(middleware));
        self
    }

    fn add(
        mut self,
        method: Method,
        path: &str,
        layers: Vec<Arc<dyn Middleware>>,
        handler: impl Handler,
    ) -> Self {
        let route = Route { handler: handler.into_boxed_handler(), layers };
        self.routes
            .entry(method)
            .or_default()
            .insert(path, route)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    /// Routes `req` and runs the middleware chain and handler, writing the
    /// response into `w`. Unmatched requests get `404` after passing through
    /// the global layers.
    pub async fn handle(&self, mut req: Request, w: &mut dyn ResponseWriter) {
        let matched = self.routes.get(req.method()).and_then(|tree| {
            let m = tree.at(req.path()).ok()?;
            let params: Params = m.params.iter().map(|(k, v)| (k.to_owned(), v.to_owned())).collect();
            Some((m.value, params))
        });

        let next = match matched {
            Some((route, params)) => {
                req.params = params;
                Next::new(&self.layers, &route.layers, &route.handler)
            }
            None => Next::new(&self.layers, &[], &self.not_found),
        };
        next.run(req, w).await;
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}
