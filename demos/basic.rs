//! Minimal keel application: a public page, a guarded admin area, a mounted
//! sub-router and a custom 404.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/
//!   curl -i http://localhost:3000/admin                      # 302 → /sign-in
//!   curl -i -H 'authorization: Bearer demo' http://localhost:3000/admin
//!   curl -i http://localhost:3000/api/users/42
//!   curl -i http://localhost:3000/nowhere                    # 404

use keel::middleware::Next;
use keel::middleware::auth::{BearerToken, Identity};
use keel::{Application, Config, Request, Response, Router, Routes, Server, StatusCode};

const CONFIG: &str = r#"
listen = "127.0.0.1:3000"
secret = "change-me"

[auth]
uriSignIn = "/sign-in"
"#;

#[tokio::main]
async fn main() -> Result<(), keel::Error> {
    tracing_subscriber::fmt::init();

    let mut api = Router::new();
    api.add("/users/{id}", get_user)?;

    let config = Config::parse(CONFIG)?;
    let server = Server::from_config(&config)?;

    let dispatcher = Application::new(config)
        .authenticator(BearerToken::new("demo", Identity::new("admin")))
        .register_middleware("powered-by", powered_by)
        .not_found(not_found)
        .routes(Routes::new()
            .route("/", home)
            .route("/sign-in", sign_in)
            .guarded("/admin", ["powered-by", "auth"], admin)
            .mount_guarded("/api", ["powered-by"], api))
        .build()?;

    server.serve(dispatcher).await
}

// Tags every response that passes through it.
async fn powered_by(req: Request, next: Next) -> Response {
    next.run(req).await.with_header("x-powered-by", "keel")
}

async fn home(_req: Request) -> Response {
    Response::html("<h1>keel</h1>")
}

async fn sign_in(_req: Request) -> &'static str {
    "sign in here"
}

async fn admin(req: Request) -> String {
    let who = req.identity().map(Identity::id).unwrap_or("nobody");
    format!("admin area, signed in as {who}")
}

// GET /api/users/{id}
async fn get_user(req: Request) -> Response {
    let id = req.param("id").unwrap_or("unknown");
    Response::json(format!(r#"{{"id":"{id}","name":"alice"}}"#).into_bytes())
}

async fn not_found(req: Request) -> Response {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .text(format!("no page at {}", req.path()))
}
