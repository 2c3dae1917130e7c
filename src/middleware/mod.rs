//! Middleware layer.
//!
//! A middleware sees the request before the route handler does. It either
//! hands the request on via [`Next::run`] or answers itself, which ends the
//! chain: neither later middlewares nor the handler run.
//!
//! ```text
//! chain [a, b] wrapping handler h:
//!
//!   request ──► a ──► b ──► h
//!   response ◄── a ◄── b ◄──┘
//! ```
//!
//! Middlewares are plain values. Any `Fn(Request, Next) -> impl Future`
//! qualifies, and so does a struct implementing [`Middleware`]. They are
//! attached to routes by name through a [`MiddlewareRegistry`].

pub mod auth;
mod registry;

use std::future::Future;
use std::sync::Arc;

use crate::handler::{BoxFuture, Endpoint, ErasedHandler};
use crate::request::Request;
use crate::response::{IntoResponse, Response};

pub use registry::MiddlewareRegistry;

/// A handler wrapper that may inspect or modify the request, or answer with
/// its own response instead of delegating.
pub trait Middleware: Send + Sync + 'static {
    fn handle(&self, req: Request, next: Next) -> BoxFuture;
}

impl<F, Fut, R> Middleware for F
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        let fut = self(req, next);
        Box::pin(async move { fut.await.into_response() })
    }
}

/// The rest of the chain after the current middleware.
#[derive(Clone, Debug)]
pub struct Next {
    endpoint: Endpoint,
}

impl Next {
    pub async fn run(self, req: Request) -> Response {
        self.endpoint.call(req).await
    }
}

/// An ordered list of middlewares. The first one listed runs first.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    layers: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a middleware. Returns `self` for chaining.
    pub fn with(mut self, middleware: impl Middleware) -> Self {
        self.layers.push(Arc::new(middleware));
        self
    }

    pub fn len(&self) -> usize { self.layers.len() }
    pub fn is_empty(&self) -> bool { self.layers.is_empty() }

    /// Composes the chain around `endpoint`. An empty chain returns it as is.
    pub fn wrap(&self, endpoint: Endpoint) -> Endpoint {
        self.layers.iter().rev().fold(endpoint, |next, middleware| {
            Endpoint::from_erased(Layer { middleware: Arc::clone(middleware), next })
        })
    }
}

impl FromIterator<Arc<dyn Middleware>> for MiddlewareChain {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Middleware>>>(iter: I) -> Self {
        Self { layers: iter.into_iter().collect() }
    }
}

struct Layer {
    middleware: Arc<dyn Middleware>,
    next: Endpoint,
}

impl ErasedHandler for Layer {
    fn call(&self, req: Request) -> BoxFuture {
        self.middleware.handle(req, Next { endpoint: self.next.clone() })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use bytes::Bytes;
    use http::StatusCode;

    use super::*;

    type Trace = Arc<Mutex<Vec<&'static str>>>;

    fn request() -> Request {
        Request::from_http(http::Request::builder().uri("/").body(Bytes::new()).unwrap())
    }

    fn recording(trace: Trace, name: &'static str) -> impl Middleware {
        move |req: Request, next: Next| {
            trace.lock().unwrap().push(name);
            next.run(req)
        }
    }

    fn handler(trace: &Trace) -> Endpoint {
        let trace = Arc::clone(trace);
        Endpoint::new(move |_req: Request| {
            trace.lock().unwrap().push("handler");
            async { "done" }
        })
    }

    #[tokio::test]
    async fn runs_in_declared_order_before_handler() {
        let trace = Trace::default();
        let chain = MiddlewareChain::new()
            .with(recording(Arc::clone(&trace), "first"))
            .with(recording(Arc::clone(&trace), "second"));

        let res = chain.wrap(handler(&trace)).call(request()).await;

        assert_eq!(res.body(), b"done");
        assert_eq!(*trace.lock().unwrap(), ["first", "second", "handler"]);
    }

    #[tokio::test]
    async fn short_circuit_skips_the_rest() {
        let trace = Trace::default();
        let chain = MiddlewareChain::new()
            .with(recording(Arc::clone(&trace), "first"))
            .with(|_req: Request, _next: Next| async { StatusCode::FORBIDDEN })
            .with(recording(Arc::clone(&trace), "never"));

        let res = chain.wrap(handler(&trace)).call(request()).await;

        assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(*trace.lock().unwrap(), ["first"]);
    }

    #[tokio::test]
    async fn empty_chain_is_transparent() {
        let trace = Trace::default();
        let res = MiddlewareChain::new().wrap(handler(&trace)).call(request()).await;
        assert_eq!(res.body(), b"done");
        assert_eq!(*trace.lock().unwrap(), ["handler"]);
    }
}
