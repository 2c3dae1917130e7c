//! Radix-tree path router.
//!
//! Routes are keyed by path only; a handler that cares about the method
//! checks [`Request::method`]. Lookup is O(path-length) via [`matchit`].
//!
//! A `Router` is itself a [`Handler`]: mounted under a prefix it dispatches
//! whatever follows that prefix against its own table.

use std::collections::HashMap;

use matchit::Router as MatchitRouter;
use tracing::debug;

use crate::error::Error;
use crate::handler::{BoxFuture, Endpoint, ErasedHandler, Handler, private};
use crate::request::Request;

/// Route argument that carries the unmatched remainder of a mounted path.
pub const MOUNT_TAIL: &str = "tail";

/// Route arguments captured by a match, by parameter name.
pub type Params = HashMap<String, String>;

/// Not-found endpoint for nested routers, carried in request extensions so
/// a miss inside a mount answers the same way as a top-level miss.
#[derive(Clone)]
pub(crate) struct Fallback(pub(crate) Endpoint);

/// A path-to-endpoint table.
///
/// ```rust
/// use keel::{Request, Response, Router};
///
/// async fn show(req: Request) -> Response {
///     Response::text(req.param("id").unwrap_or_default().to_owned())
/// }
///
/// let mut router = Router::new();
/// router.add("/users/{id}", show).unwrap();
/// assert!(router.dispatch("/users/7").is_ok());
/// assert!(router.dispatch("/teams/7").is_err());
/// ```
#[derive(Default)]
pub struct Router {
    tree: MatchitRouter<Endpoint>,
    paths: Vec<String>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `path`. Path parameters use `{name}` syntax.
    /// A missing leading `/` is added, as it is for request paths.
    ///
    /// Fails with [`Error::InvalidRoute`] when the pattern is malformed or
    /// another route already claims the same path.
    pub fn add(&mut self, path: &str, handler: impl Handler) -> Result<(), Error> {
        self.insert(path, handler.into_endpoint())
    }

    /// Registers `handler` for `prefix` and everything below it.
    ///
    /// The remainder after the prefix is exposed as the [`MOUNT_TAIL`]
    /// argument; a mounted [`Router`] consumes it to dispatch further.
    pub fn mount(&mut self, prefix: &str, handler: impl Handler) -> Result<(), Error> {
        let endpoint = handler.into_endpoint();
        let prefix = prefix.trim_end_matches('/');
        let root = if prefix.is_empty() { "/" } else { prefix };
        self.insert(root, endpoint.clone())?;
        self.insert(&format!("{prefix}/{{*{MOUNT_TAIL}}}"), endpoint)
    }

    fn insert(&mut self, path: &str, endpoint: Endpoint) -> Result<(), Error> {
        let path = if path.starts_with('/') { path.to_owned() } else { format!("/{path}") };
        self.tree
            .insert(path.as_str(), endpoint)
            .map_err(|source| Error::InvalidRoute { path: path.clone(), source })?;
        self.paths.push(path);
        Ok(())
    }

    /// Looks up `path`, returning the bound endpoint and its route arguments.
    pub fn dispatch(&self, path: &str) -> Result<(Endpoint, Params), Error> {
        let matched = self.tree
            .at(path)
            .map_err(|_| Error::RouteNotFound(path.to_owned()))?;
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Ok((matched.value.clone(), params))
    }

    /// Registered patterns in insertion order. A mount counts twice.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize { self.paths.len() }
    pub fn is_empty(&self) -> bool { self.paths.is_empty() }
}

impl ErasedHandler for Router {
    fn call(&self, mut req: Request) -> BoxFuture {
        let path = match req.params.remove(MOUNT_TAIL) {
            Some(tail) => format!("/{tail}"),
            None => "/".to_owned(),
        };
        match self.dispatch(&path) {
            Ok((endpoint, params)) => {
                req.params.extend(params);
                endpoint.call(req)
            }
            Err(_) => {
                debug!(path, "no nested route matched");
                match req.extensions().get::<Fallback>().cloned() {
                    Some(Fallback(fallback)) => fallback.call(req),
                    None => Box::pin(crate::app::page_not_found(req)),
                }
            }
        }
    }
}

impl private::Sealed for Router {}

impl Handler for Router {
    fn into_endpoint(self) -> Endpoint {
        Endpoint::from_erased(self)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::StatusCode;

    use super::*;
    use crate::response::Response;

    fn request(uri: &str) -> Request {
        Request::from_http(http::Request::builder().uri(uri).body(Bytes::new()).unwrap())
    }

    async fn echo_id(req: Request) -> Response {
        Response::text(req.param("id").unwrap_or("none").to_owned())
    }

    #[test]
    fn dispatch_captures_params() {
        let mut router = Router::new();
        router.add("/users/{id}", echo_id).unwrap();

        let (_, params) = router.dispatch("/users/42").unwrap();
        assert_eq!(params.get("id").map(String::as_str), Some("42"));
    }

    #[test]
    fn miss_is_route_not_found() {
        let router = Router::new();
        assert!(matches!(router.dispatch("/nope"), Err(Error::RouteNotFound(p)) if p == "/nope"));
    }

    #[test]
    fn duplicate_path_is_rejected() {
        let mut router = Router::new();
        router.add("/a", echo_id).unwrap();
        let err = router.add("/a", echo_id).unwrap_err();
        assert!(matches!(err, Error::InvalidRoute { path, .. } if path == "/a"));
        assert_eq!(router.len(), 1);
    }

    #[test]
    fn relative_paths_get_a_leading_slash() {
        let mut router = Router::new();
        router.add("users/{id}", echo_id).unwrap();
        router.mount("api", Router::new()).unwrap();

        assert_eq!(router.paths().collect::<Vec<_>>(), ["/users/{id}", "/api", "/api/{*tail}"]);
        assert!(router.dispatch("/users/1").is_ok());
        assert!(router.dispatch("/api/v1").is_ok());
        assert!(matches!(router.add("/users/{id}", echo_id), Err(Error::InvalidRoute { .. })));
    }

    #[tokio::test]
    async fn mounted_router_dispatches_tail() {
        let mut admin = Router::new();
        admin.add("/", |_req: Request| async { "admin home" }).unwrap();
        admin.add("/users/{id}", echo_id).unwrap();

        let mut root = Router::new();
        root.mount("/admin", admin).unwrap();
        assert_eq!(root.paths().collect::<Vec<_>>(), ["/admin", "/admin/{*tail}"]);

        let (endpoint, params) = root.dispatch("/admin/users/9").unwrap();
        let mut req = request("/admin/users/9");
        req.params = params;
        let res = endpoint.call(req).await;
        assert_eq!(res.body(), b"9");

        let (endpoint, params) = root.dispatch("/admin").unwrap();
        let mut req = request("/admin");
        req.params = params;
        assert_eq!(endpoint.call(req).await.body(), b"admin home");
    }

    #[tokio::test]
    async fn nested_miss_is_404() {
        let mut root = Router::new();
        root.mount("/admin", Router::new()).unwrap();

        let (endpoint, params) = root.dispatch("/admin/missing").unwrap();
        let mut req = request("/admin/missing");
        req.params = params;
        assert_eq!(endpoint.call(req).await.status_code(), StatusCode::NOT_FOUND);
    }
}
