//! Handler trait and type erasure.
//!
//! # How handlers are stored
//!
//! Routes, middleware layers and the not-found fallback all hold handlers of
//! *different* concrete types, yet the router's table can only hold one. So
//! every handler is erased behind [`Endpoint`], a cheap-to-clone
//! `Arc<dyn ErasedHandler>`:
//!
//! ```text
//! async fn home(req: Request) -> Response { … }    ← user writes this
//!        ↓ routes.route("/", home)
//! home.into_endpoint()                              ← Handler blanket impl
//!        ↓
//! Endpoint(Arc::new(FnHandler(home)))               ← heap-allocated wrapper
//!        ↓ optionally wrapped by MiddlewareChain::wrap
//! endpoint.call(req)  at request time               ← one vtable dispatch per layer
//! ```
//!
//! Wrapping an endpoint in middleware yields another endpoint, and so does a
//! nested [`Router`](crate::Router). That is what lets a route's target be a
//! plain function, a guarded function or a whole sub-router interchangeably.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// A heap-allocated, type-erased future that resolves to a [`Response`].
///
/// `Send + 'static` so tokio can move it across worker threads.
pub type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Internal dispatch interface shared by functions, middleware layers and
/// nested routers.
pub(crate) trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A type-erased handler, shared across concurrent requests.
///
/// Cloning is one atomic increment.
#[derive(Clone)]
pub struct Endpoint(Arc<dyn ErasedHandler + Send + Sync + 'static>);

impl Endpoint {
    /// Erases any [`Handler`].
    pub fn new(handler: impl Handler) -> Self {
        handler.into_endpoint()
    }

    pub(crate) fn from_erased(handler: impl ErasedHandler + Send + Sync + 'static) -> Self {
        Self(Arc::new(handler))
    }

    /// Runs the handler for `req`.
    pub fn call(&self, req: Request) -> BoxFuture {
        self.0.call(req)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Endpoint")
    }
}

/// Implemented for every valid route target.
///
/// You never implement this yourself. It is satisfied by:
///
/// - any `async fn name(req: Request) -> impl IntoResponse` (or an equivalent
///   closure),
/// - an [`Endpoint`], including one already wrapped in middleware,
/// - a [`Router`](crate::Router), which dispatches the rest of the path.
///
/// The trait is sealed so those three stay the only shapes a route accepts.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_endpoint(self) -> Endpoint;
}

pub(crate) mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_endpoint(self) -> Endpoint {
        Endpoint::from_erased(FnHandler(self))
    }
}

impl private::Sealed for Endpoint {}

impl Handler for Endpoint {
    fn into_endpoint(self) -> Endpoint {
        self
    }
}

/// Bridges a typed handler function to the trait-object world.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}
