use crate::server::{routes::auth::LoginPath, session::SessionConfig};
use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{FormRejection, PathRejection},
    },
    http::{StatusCode, Uri},
    middleware,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::routing::TypedPath;
use blogwerk_common::model::{
    Id,
    password::PasswordHashError,
    post::PostMarker,
    session::SessionTokenHashError,
    user::UserMarker,
};
use blogwerk_db::client::{DbClient, DbError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

mod auth;
mod form;
mod html;
mod pages;
mod routes;
pub mod session;


pub type ServerRouter = Router<ServerState>;

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub db_client: Arc<DbClient>,
    pub session_config: SessionConfig,
}

/// The complete application: every route, with the current user resolved
/// once per request before any handler runs.
pub fn app(state: ServerState) -> Router {
    routes()
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session::load_current_user,
        ))
        .with_state(state)
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("No page exists at {0}.")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Incoming form rejected: {0}")]
    FormRejection(#[from] FormRejection),
    #[error("This page requires a logged in user")]
    LoginRequired,
    #[error("User {user} is not the author of post {post}")]
    NotAuthor {
        post: Id<PostMarker>,
        user: Id<UserMarker>,
    },
    #[error("Post id {0} doesn't exist.")]
    PostByIdNotFound(Id<PostMarker>),
    #[error(transparent)]
    Database(#[from] DbError),
    #[error(transparent)]
    PasswordHash(#[from] PasswordHashError),
    #[error(transparent)]
    SessionTokenHash(#[from] SessionTokenHashError),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostByIdNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::FormRejection(rejection) => rejection.status(),
            ServerError::LoginRequired => StatusCode::SEE_OTHER,
            ServerError::NotAuthor { .. } => StatusCode::FORBIDDEN,
            ServerError::Database(_)
            | ServerError::PasswordHash(_)
            | ServerError::SessionTokenHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text that is safe to show to the client. Internal errors only
    /// expose their status.
    fn public_detail(&self) -> Option<String> {
        match self {
            ServerError::UnknownRoute(_) | ServerError::PostByIdNotFound(_) => {
                Some(self.to_string())
            }
            ServerError::FormRejection(rejection) => Some(rejection.body_text()),
            _ => None,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(error = %self, %status, "Replying with error");
        } else {
            debug!(error = %self, %status, "Replying with error");
        }

        if let ServerError::LoginRequired = self {
            return Redirect::to(LoginPath::PATH).into_response();
        }

        let detail = self.public_detail();
        (status, pages::error(status, detail.as_deref())).into_response()
    }
}
