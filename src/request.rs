//! Incoming HTTP request type.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use bytes::Bytes;
use http::request::Parts;
use http::{HeaderMap, Method, Uri};

use crate::body::{Body, BoxError};

/// An incoming HTTP request.
///
/// The head (method, URI, headers) is parsed by hyper. The body is a stream
/// that can be read once: through [`Request::bytes`], or by taking it with
/// [`Request::take_body`]. Middleware may swap it for another body with the
/// same content via [`Request::replace_body`].
pub struct Request {
    pub(crate) head: Parts,
    pub(crate) body: Body,
    pub(crate) params: Params,
    pub(crate) remote_addr: Option<SocketAddr>,
}

impl Request {
    pub fn new<B: Into<Body>>(req: http::Request<B>) -> Self {
        let (head, body) = req.into_parts();
        Self { head, body: body.into(), params: Params::default(), remote_addr: None }
    }

    /// Records the peer address of the connection the request arrived on.
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn method(&self) -> &Method { &self.head.method }
    pub fn uri(&self) -> &Uri { &self.head.uri }
    pub fn path(&self) -> &str { self.head.uri.path() }
    pub fn query(&self) -> Option<&str> { self.head.uri.query() }
    pub fn headers(&self) -> &HeaderMap { &self.head.headers }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }
    pub fn params(&self) -> &Params { &self.params }

    /// Header lookup (names are case-insensitive). Non-UTF-8 values read as `None`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key)
    }

    /// Best guess at the originating client.
    ///
    /// Behind a reverse proxy the socket peer is the proxy itself, so the
    /// first `X-Forwarded-For` entry wins, then `X-Real-IP`, then the peer.
    pub fn client_ip(&self) -> Option<IpAddr> {
        let forwarded = self
            .header("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .and_then(|ip| ip.trim().parse().ok());
        forwarded
            .or_else(|| self.header("x-real-ip").and_then(|ip| ip.trim().parse().ok()))
            .or_else(|| self.remote_addr.map(|addr| addr.ip()))
    }

    pub fn body_mut(&mut self) -> &mut Body { &mut self.body }

    /// Takes the body, leaving an empty one behind.
    pub fn take_body(&mut self) -> Body {
        std::mem::take(&mut self.body)
    }

    /// Installs `body` and returns the previous one.
    pub fn replace_body(&mut self, body: Body) -> Body {
        std::mem::replace(&mut self.body, body)
    }

    /// Reads the whole body. A second call returns empty bytes.
    pub async fn bytes(&mut self) -> Result<Bytes, BoxError> {
        self.take_body().collect_bytes().await
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.head.method)
            .field("uri", &self.head.uri)
            .field("params", &self.params)
            .field("remote_addr", &self.remote_addr)
            .finish_non_exhaustive()
    }
}

/// Route parameters in the order they appear in the matched route.
///
/// Displays as `[id=42 name=alice]`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl FromIterator<(String, String)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{k}={v}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(headers: &[(&'static str, &'static str)]) -> Request {
        let mut builder = http::Request::builder().uri("/users/42?verbose=1");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        Request::new(builder.body(Body::empty()).unwrap())
            .with_remote_addr("10.0.0.7:5123".parse().unwrap())
    }

    #[test]
    fn client_ip_prefers_forwarded_headers() {
        let req = request(&[("x-forwarded-for", "203.0.113.9, 10.0.0.1"), ("x-real-ip", "198.51.100.2")]);
        assert_eq!(req.client_ip(), "203.0.113.9".parse().ok());

        let req = request(&[("x-real-ip", "198.51.100.2")]);
        assert_eq!(req.client_ip(), "198.51.100.2".parse().ok());

        let req = request(&[]);
        assert_eq!(req.client_ip(), "10.0.0.7".parse().ok());
    }

    #[test]
    fn path_and_query_come_from_uri() {
        let req = request(&[]);
        assert_eq!(req.path(), "/users/42");
        assert_eq!(req.query(), Some("verbose=1"));
    }

    #[test]
    fn params_display_in_route_order() {
        let params: Params = [("id", "42"), ("tab", "posts")]
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        assert_eq!(params.to_string(), "[id=42 tab=posts]");
        assert_eq!(params.get("tab"), Some("posts"));
        assert_eq!(Params::default().to_string(), "[]");
    }

    #[tokio::test]
    async fn body_reads_once() {
        let mut req = Request::new(http::Request::new(Body::from("payload")));
        assert_eq!(&req.bytes().await.unwrap()[..], b"payload");
        assert!(req.bytes().await.unwrap().is_empty());
    }
}
