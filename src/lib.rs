//! # keel
//!
//! A small bootstrap layer for HTTP applications: a route table, named
//! middleware chains, a not-found fallback and layered configuration, served
//! by hyper.
//!
//! ## The model
//!
//! - A [`Routes`] table maps path patterns to handlers. Each route may list
//!   middleware **names** that guard it, in order.
//! - An [`Application`] owns the config and a registry of named middlewares.
//!   [`Application::build`] resolves every name and produces a
//!   [`Dispatcher`]. An unknown name or a duplicate path fails here, at
//!   startup.
//! - The [`Dispatcher`] routes each request. The matched handler runs inside
//!   its middlewares, first name outermost. Any middleware may answer on its
//!   own and stop the chain. A path with no route gets the not-found handler,
//!   a `404`.
//!
//! There is no global application instance. The shared [`Config`] and the
//! authenticated [`Identity`](middleware::auth::Identity) reach handlers
//! through the [`Request`].
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use keel::middleware::auth::{BearerToken, Identity};
//! use keel::middleware::Next;
//! use keel::{Application, Config, Mode, Request, Response, Routes};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), keel::Error> {
//!     let app = Application::from_dir("config", Mode::from_env())?
//!         .authenticator(BearerToken::new("s3cret", Identity::new("ops")))
//!         .register_middleware("trace", trace)
//!         .routes(Routes::new()
//!             .route("/", home)
//!             .guarded("/admin/{section}", ["trace", "auth"], admin));
//!
//!     app.serve().await
//! }
//!
//! async fn trace(req: Request, next: Next) -> Response {
//!     tracing::info!(path = req.path(), "incoming");
//!     next.run(req).await
//! }
//!
//! async fn home(_req: Request) -> &'static str {
//!     "welcome"
//! }
//!
//! async fn admin(req: Request) -> Response {
//!     Response::text(format!("section {}", req.param("section").unwrap_or("?")))
//! }
//! ```

mod app;
mod config;
mod error;
mod handler;
mod request;
mod response;
mod router;
mod routes;
mod server;

pub mod middleware;

pub use app::{Application, Dispatcher, page_not_found, redirect_to};
pub use config::{Config, Mode};
pub use error::Error;
pub use handler::{BoxFuture, Endpoint, Handler};
pub use http::StatusCode;
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::{MOUNT_TAIL, Params, Router};
pub use routes::{Route, Routes};
pub use server::Server;
