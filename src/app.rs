//! Application bootstrap and request dispatch.
//!
//! [`Application`] collects everything an app declares (config, routes,
//! named middlewares, the not-found page, the authenticator) and
//! [`build`](Application::build)s it into a [`Dispatcher`]. All name
//! resolution and route validation happens there, once, before the first
//! request. The dispatcher is immutable afterwards and shared across
//! connections behind an `Arc`.

use std::path::Path;
use std::sync::Arc;

use http::StatusCode;
use tracing::{debug, info};

use crate::config::{Config, Mode};
use crate::error::Error;
use crate::handler::{Endpoint, Handler};
use crate::middleware::auth::{AUTH, Authenticator, Authorised, DenyAll};
use crate::middleware::{Middleware, MiddlewareRegistry};
use crate::request::Request;
use crate::response::Response;
use crate::router::{Fallback, Params, Router};
use crate::routes::{Kind, Routes};
use crate::server::Server;

/// Default not-found page: `404` with a short plain-text body.
pub async fn page_not_found(_req: Request) -> Response {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .text("404 page not found")
}

/// An endpoint that redirects every request to `uri`.
pub fn redirect_to(uri: impl Into<String>) -> Endpoint {
    let uri = uri.into();
    Endpoint::new(move |_req: Request| {
        let res = Response::redirect(&uri);
        async move { res }
    })
}

/// Application builder.
///
/// ```rust
/// use keel::{Application, Config, Request, Routes};
///
/// async fn home(_: Request) -> &'static str { "home" }
/// async fn account(req: Request) -> String {
///     format!("hello {}", req.identity().map(|i| i.id()).unwrap_or("?"))
/// }
///
/// let config = Config::parse(r#"
///     [auth]
///     uriSignIn = "/sign-in"
/// "#).unwrap();
///
/// let dispatcher = Application::new(config)
///     .routes(Routes::new()
///         .route("/", home)
///         .guarded("/account", ["auth"], account))
///     .build()
///     .unwrap();
/// # let _ = dispatcher;
/// ```
pub struct Application {
    config: Arc<Config>,
    routes: Routes,
    middlewares: MiddlewareRegistry,
    not_found: Endpoint,
    authenticator: Arc<dyn Authenticator>,
}

impl Application {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            routes: Routes::new(),
            middlewares: MiddlewareRegistry::new(),
            not_found: Endpoint::new(page_not_found),
            authenticator: Arc::new(DenyAll),
        }
    }

    /// Loads the layered config from `dir` (see [`Config::load`]).
    pub fn from_dir(dir: impl AsRef<Path>, mode: Mode) -> Result<Self, Error> {
        let config = Config::load(dir, mode)?;
        info!(mode = %mode, "configuration loaded");
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Appends `routes` to the route table.
    pub fn routes(mut self, routes: Routes) -> Self {
        self.routes = std::mem::take(&mut self.routes).merge(routes);
        self
    }

    /// Makes `middleware` available to routes under `name`.
    ///
    /// Registering `"auth"` replaces the built-in [`Authorised`] guard.
    pub fn register_middleware(mut self, name: impl Into<String>, middleware: impl Middleware) -> Self {
        self.middlewares.register(name, middleware);
        self
    }

    /// Replaces the default [`page_not_found`] handler.
    pub fn not_found(mut self, handler: impl Handler) -> Self {
        self.not_found = handler.into_endpoint();
        self
    }

    /// Sets who the built-in `"auth"` guard lets through. Defaults to
    /// [`DenyAll`].
    pub fn authenticator(mut self, authenticator: impl Authenticator) -> Self {
        self.authenticator = Arc::new(authenticator);
        self
    }

    /// Resolves one registered middleware by name.
    pub fn get_middleware(&self, name: &str) -> Result<Arc<dyn Middleware>, Error> {
        self.middlewares.get(name)
    }

    /// Wraps `handler` in the named middlewares, first name outermost.
    pub fn chain_middlewares<I, S>(&self, handler: impl Handler, names: I) -> Result<Endpoint, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(self.middlewares.chain(names)?.wrap(handler.into_endpoint()))
    }

    /// Where the `"auth"` guard sends callers it rejects: the configured
    /// sign-in page, or a bare `401` when none is configured.
    fn unauthorised_handler(&self) -> Endpoint {
        match self.config.sign_in_uri() {
            Some(uri) => redirect_to(uri),
            None => Endpoint::new(|_req: Request| async { StatusCode::UNAUTHORIZED }),
        }
    }

    /// Resolves every route's middleware names and builds the router.
    ///
    /// Fails on the first unregistered middleware name or invalid/duplicate
    /// route path.
    pub fn build(mut self) -> Result<Dispatcher, Error> {
        if !self.middlewares.contains(AUTH) {
            let guard = Authorised::new(Arc::clone(&self.authenticator), self.unauthorised_handler());
            self.middlewares.register(AUTH, guard);
        }

        let mut router = Router::new();
        for route in std::mem::take(&mut self.routes) {
            let endpoint = self.chain_middlewares(route.endpoint, &route.middlewares)?;
            match route.kind {
                Kind::Exact => router.add(&route.path, endpoint)?,
                Kind::Mount => router.mount(&route.path, endpoint)?,
            }
            debug!(path = %route.path, middlewares = ?route.middlewares, "route registered");
        }

        let base_uri = self.config.base_uri().trim_end_matches('/').to_owned();
        info!(routes = router.len(), base_uri = %self.config.base_uri(), "dispatcher ready");

        Ok(Dispatcher {
            router,
            not_found: self.not_found,
            config: self.config,
            base_uri,
        })
    }

    /// Builds the dispatcher and serves it on the configured `listen`
    /// address until shutdown.
    pub async fn serve(self) -> Result<(), Error> {
        let server = Server::from_config(&self.config)?;
        server.serve(self.build()?).await
    }
}

/// The composed request handler produced by [`Application::build`].
pub struct Dispatcher {
    router: Router,
    not_found: Endpoint,
    config: Arc<Config>,
    base_uri: String,
}

impl Dispatcher {
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Picks the endpoint for `uri`: the matched route's composed handler
    /// with its route arguments, or the not-found handler with none.
    pub fn dispatch(&self, uri: &str) -> (Endpoint, Params) {
        match self.router.dispatch(uri) {
            Ok(matched) => matched,
            Err(_) => {
                debug!(uri, "no route matched, serving not-found handler");
                (self.not_found.clone(), Params::new())
            }
        }
    }

    /// Routes and runs one request.
    pub async fn handle(&self, mut req: Request) -> Response {
        req.extensions_mut().insert(Arc::clone(&self.config));
        req.extensions_mut().insert(Fallback(self.not_found.clone()));

        let (endpoint, params) = match self.local_path(req.path()) {
            Some(path) => self.dispatch(path),
            None => {
                debug!(path = req.path(), base_uri = %self.base_uri, "outside base uri");
                (self.not_found.clone(), Params::new())
            }
        };
        req.params = params;
        endpoint.call(req).await
    }

    /// `path` relative to the configured base uri, if it lies beneath it.
    fn local_path<'a>(&self, path: &'a str) -> Option<&'a str> {
        if self.base_uri.is_empty() {
            return Some(path);
        }
        match path.strip_prefix(self.base_uri.as_str())? {
            "" => Some("/"),
            rest if rest.starts_with('/') => Some(rest),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher(base_uri: &str) -> Dispatcher {
        let config = Config::parse(&format!("base_uri = \"{base_uri}\"")).unwrap();
        Application::new(config).build().unwrap()
    }

    #[test]
    fn base_uri_is_stripped() {
        let d = dispatcher("/app/");
        assert_eq!(d.local_path("/app"), Some("/"));
        assert_eq!(d.local_path("/app/users"), Some("/users"));
        assert_eq!(d.local_path("/application"), None);
        assert_eq!(d.local_path("/other"), None);
    }

    #[test]
    fn root_base_uri_is_identity() {
        let d = dispatcher("/");
        assert_eq!(d.local_path("/users"), Some("/users"));
    }

    #[test]
    fn auth_is_registered_on_build() {
        let app = Application::new(Config::default())
            .routes(Routes::new().guarded("/x", ["auth"], |_req: Request| async { "x" }));
        assert!(app.get_middleware(AUTH).is_err());
        assert!(app.build().is_ok());
    }
}
