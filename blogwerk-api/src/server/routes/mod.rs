use crate::server::ServerRouter;
use axum_extra::routing::{RouterExt, TypedPath};

pub mod auth;
pub mod blog;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .merge(auth::routes())
        .merge(blog::routes())
        .typed_get(hello)
}

#[derive(TypedPath)]
#[typed_path("/hello")]
struct HelloPath;

async fn hello(_: HelloPath) -> &'static str {
    "Hello, World!"
}
