use crate::server::{ServerError, session::CurrentUser};
use axum::{extract::FromRequestParts, http::request::Parts};
use blogwerk_common::model::{
    Id,
    post::Post,
    user::{User, UserMarker},
};

/// Extracting this guards a handler: requests without a logged in user are
/// rejected with [`ServerError::LoginRequired`] before the handler runs.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct AuthenticatedUser {
    user: User,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn user_id(&self) -> Id<UserMarker> {
        self.user.id
    }

    #[must_use]
    pub fn user(&self) -> &User {
        &self.user
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<CurrentUser>() {
            Some(CurrentUser(Some(user))) => Ok(Self { user: user.clone() }),
            _ => Err(ServerError::LoginRequired),
        }
    }
}

pub fn require_author(post: &Post, actor: &AuthenticatedUser) -> Result<(), ServerError> {
    if post.is_authored_by(actor.user_id()) {
        Ok(())
    } else {
        Err(ServerError::NotAuthor {
            post: post.id,
            user: actor.user_id(),
        })
    }
}
