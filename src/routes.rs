//! Declarative route table.

use crate::handler::{Endpoint, Handler};

/// How a route's target is registered on the router.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Kind {
    /// The path pattern alone.
    Exact,
    /// The prefix and everything below it.
    Mount,
}

/// One route: a path, the middleware names guarding it, and its target.
#[derive(Clone, Debug)]
pub struct Route {
    pub(crate) path: String,
    pub(crate) middlewares: Vec<String>,
    pub(crate) endpoint: Endpoint,
    pub(crate) kind: Kind,
}

impl Route {
    pub fn path(&self) -> &str { &self.path }
    pub fn middlewares(&self) -> &[String] { &self.middlewares }
}

/// Ordered route definitions, resolved into a router by
/// [`Application::build`](crate::Application::build).
///
/// Middleware names are only recorded here; they are looked up in the
/// application's registry at build time.
///
/// ```rust
/// use keel::{Request, Router, Routes};
///
/// async fn home(_: Request) -> &'static str { "home" }
/// async fn settings(_: Request) -> &'static str { "settings" }
///
/// let routes = Routes::new()
///     .route("/", home)
///     .guarded("/settings", ["auth"], settings)
///     .mount("/api", Router::new());
/// assert_eq!(routes.len(), 3);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Routes {
    routes: Vec<Route>,
}

impl Routes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unguarded route.
    pub fn route(self, path: &str, handler: impl Handler) -> Self {
        self.push(path, Vec::new(), handler.into_endpoint(), Kind::Exact)
    }

    /// Route wrapped by the named middlewares, first name outermost.
    pub fn guarded<I, S>(self, path: &str, middlewares: I, handler: impl Handler) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = middlewares.into_iter().map(Into::into).collect();
        self.push(path, names, handler.into_endpoint(), Kind::Exact)
    }

    /// Target serving `prefix` and every path below it, usually a
    /// [`Router`](crate::Router).
    pub fn mount(self, prefix: &str, handler: impl Handler) -> Self {
        self.push(prefix, Vec::new(), handler.into_endpoint(), Kind::Mount)
    }

    /// [`mount`](Self::mount) behind the named middlewares.
    pub fn mount_guarded<I, S>(self, prefix: &str, middlewares: I, handler: impl Handler) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = middlewares.into_iter().map(Into::into).collect();
        self.push(prefix, names, handler.into_endpoint(), Kind::Mount)
    }

    fn push(mut self, path: &str, middlewares: Vec<String>, endpoint: Endpoint, kind: Kind) -> Self {
        self.routes.push(Route { path: path.to_owned(), middlewares, endpoint, kind });
        self
    }

    /// Appends every route of `other`.
    pub fn merge(mut self, other: Routes) -> Self {
        self.routes.extend(other.routes);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize { self.routes.len() }
    pub fn is_empty(&self) -> bool { self.routes.is_empty() }
}

impl IntoIterator for Routes {
    type Item = Route;
    type IntoIter = std::vec::IntoIter<Route>;

    fn into_iter(self) -> Self::IntoIter {
        self.routes.into_iter()
    }
}
