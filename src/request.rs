//! Incoming HTTP request type.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::{Extensions, HeaderMap, Method};

use crate::config::Config;
use crate::middleware::auth::Identity;

/// An incoming HTTP request with its body fully buffered.
///
/// Besides the wire data a request carries the route arguments of the match
/// that selected its handler and a typed [`Extensions`] map. The dispatcher
/// puts the shared [`Config`] there and the `auth` middleware adds the
/// caller's [`Identity`], so handlers never need a global to reach either.
pub struct Request {
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
    pub(crate) params: HashMap<String, String>,
    extensions: Extensions,
}

impl Request {
    /// Wraps a buffered `http` request. The path always starts with `/`.
    pub fn from_http(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self {
            method: parts.method,
            path: normalize_path(parts.uri.path()),
            query: parts.uri.query().map(str::to_owned),
            headers: parts.headers,
            body,
            params: HashMap::new(),
            extensions: parts.extensions,
        }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn query(&self) -> Option<&str> { self.query.as_deref() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Case-insensitive header lookup. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Returns a named route argument.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> { &self.params }

    pub fn extensions(&self) -> &Extensions { &self.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.extensions }

    /// The application config, present on every request served by a
    /// [`Dispatcher`](crate::Dispatcher).
    pub fn config(&self) -> Option<&Config> {
        self.extensions.get::<Arc<Config>>().map(Arc::as_ref)
    }

    /// The caller identity, present once the `auth` middleware has let the
    /// request through.
    pub fn identity(&self) -> Option<&Identity> {
        self.extensions.get::<Identity>()
    }

    /// Peer address of the connection, set by [`Server`](crate::Server).
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.extensions.get::<SocketAddr>().copied()
    }
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_owned()
    } else {
        format!("/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str) -> Request {
        Request::from_http(http::Request::builder().uri(uri).body(Bytes::new()).unwrap())
    }

    #[test]
    fn splits_path_and_query() {
        let req = request("/search?q=rust");
        assert_eq!(req.path(), "/search");
        assert_eq!(req.query(), Some("q=rust"));
    }

    #[test]
    fn leading_slash_is_added() {
        assert_eq!(normalize_path("users/1"), "/users/1");
        assert_eq!(normalize_path("/users/1"), "/users/1");
    }

    #[test]
    fn header_lookup_ignores_case() {
        let req = Request::from_http(
            http::Request::builder()
                .uri("/")
                .header("X-Request-Id", "abc")
                .body(Bytes::new())
                .unwrap(),
        );
        assert_eq!(req.header("x-request-id"), Some("abc"));
        assert_eq!(req.header("X-REQUEST-ID"), Some("abc"));
        assert_eq!(req.header("missing"), None);
    }
}
