//! Authorisation middleware.
//!
//! [`Authorised`] asks an [`Authenticator`] who is calling. A known caller's
//! [`Identity`] is stored in the request extensions for the handler; an
//! unknown caller is answered by the configured "unauthorised" endpoint,
//! typically a redirect to the sign-in page.
//!
//! [`Application`](crate::Application) registers one under the name
//! `"auth"`, so a route opts in with `routes.guarded(path, ["auth"], h)`.

use std::sync::Arc;

use tracing::debug;

use crate::handler::{BoxFuture, Endpoint};
use crate::request::Request;

use super::{Middleware, Next};

/// Name under which the application registers its [`Authorised`] guard.
pub const AUTH: &str = "auth";

/// An authenticated caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    id: String,
}

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str { &self.id }
}

/// Decides who, if anyone, sent a request.
pub trait Authenticator: Send + Sync + 'static {
    fn authenticate(&self, req: &Request) -> Option<Identity>;
}

/// Rejects everyone. Used until an application configures a real
/// authenticator.
#[derive(Clone, Copy, Debug, Default)]
pub struct DenyAll;

impl Authenticator for DenyAll {
    fn authenticate(&self, _req: &Request) -> Option<Identity> {
        None
    }
}

/// Accepts requests carrying `Authorization: Bearer <token>` for one fixed
/// token and maps them to one identity.
#[derive(Clone, Debug)]
pub struct BearerToken {
    token: String,
    identity: Identity,
}

impl BearerToken {
    pub fn new(token: impl Into<String>, identity: Identity) -> Self {
        Self { token: token.into(), identity }
    }
}

impl Authenticator for BearerToken {
    fn authenticate(&self, req: &Request) -> Option<Identity> {
        let presented = req.header("authorization")?.strip_prefix("Bearer ")?.trim();
        (!presented.is_empty() && presented == self.token).then(|| self.identity.clone())
    }
}

/// Lets authenticated requests through and hands the rest to `unauthorised`.
#[derive(Clone)]
pub struct Authorised {
    authenticator: Arc<dyn Authenticator>,
    unauthorised: Endpoint,
}

impl Authorised {
    pub fn new(authenticator: Arc<dyn Authenticator>, unauthorised: Endpoint) -> Self {
        Self { authenticator, unauthorised }
    }
}

impl Middleware for Authorised {
    fn handle(&self, mut req: Request, next: Next) -> BoxFuture {
        match self.authenticator.authenticate(&req) {
            Some(identity) => {
                debug!(identity = identity.id(), path = req.path(), "request authorised");
                req.extensions_mut().insert(identity);
                Box::pin(next.run(req))
            }
            None => {
                debug!(path = req.path(), "request not authorised");
                self.unauthorised.call(req)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::StatusCode;

    use super::*;
    use crate::middleware::MiddlewareChain;
    use crate::response::Response;

    fn request(authorization: Option<&str>) -> Request {
        let mut builder = http::Request::builder().uri("/admin");
        if let Some(value) = authorization {
            builder = builder.header("authorization", value);
        }
        Request::from_http(builder.body(Bytes::new()).unwrap())
    }

    fn guarded(authenticator: impl Authenticator) -> Endpoint {
        let guard = Authorised::new(
            Arc::new(authenticator),
            Endpoint::new(|_req: Request| async { Response::redirect("/sign-in") }),
        );
        let handler = Endpoint::new(|req: Request| async move {
            let who = req.identity().map(|i| i.id().to_owned()).unwrap_or_default();
            Response::text(who)
        });
        MiddlewareChain::new().with(guard).wrap(handler)
    }

    #[tokio::test]
    async fn valid_token_reaches_handler_with_identity() {
        let endpoint = guarded(BearerToken::new("s3cret", Identity::new("ops")));
        let res = endpoint.call(request(Some("Bearer s3cret"))).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body(), b"ops");
    }

    #[tokio::test]
    async fn wrong_or_missing_token_is_redirected() {
        let endpoint = guarded(BearerToken::new("s3cret", Identity::new("ops")));
        for header in [None, Some("Bearer nope"), Some("Basic s3cret"), Some("Bearer ")] {
            let res = endpoint.call(request(header)).await;
            assert_eq!(res.status_code(), StatusCode::FOUND, "{header:?}");
            assert_eq!(res.header("location"), Some("/sign-in"));
        }
    }

    #[tokio::test]
    async fn deny_all_never_reaches_handler() {
        let res = guarded(DenyAll).call(request(Some("Bearer anything"))).await;
        assert_eq!(res.status_code(), StatusCode::FOUND);
    }
}
