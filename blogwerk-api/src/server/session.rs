//! Server-side sessions.
//!
//! The browser only ever holds a random [`SessionToken`] in the `session`
//! cookie. The database keeps the token's hash together with the id of the
//! logged in user, so the cookie alone is meaningless without a matching row.

use crate::server::Result;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use blogwerk_common::model::{
    session::{PositiveDuration, Session, SessionToken, SessionTokenHash},
    user::User,
};
use blogwerk_db::client::DbClient;
use std::{convert::Infallible, sync::Arc};
use time::UtcDateTime;
use tracing::{debug, warn};

pub const SESSION_COOKIE: &str = "session";

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct SessionConfig {
    /// `None` keeps sessions alive until logout and makes the cookie a
    /// browser-session cookie.
    pub lifetime: Option<PositiveDuration>,
    pub secure_cookie: bool,
}

impl SessionConfig {
    fn session_cookie(self, token: &SessionToken) -> Cookie<'static> {
        let mut cookie = Cookie::build((SESSION_COOKIE, token.as_token_str()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure_cookie);

        if let Some(lifetime) = self.lifetime {
            cookie = cookie.max_age(lifetime.get());
        }

        cookie.build()
    }
}

/// The user the current request acts as, resolved once per request by
/// [`load_current_user`].
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct CurrentUser(pub Option<User>);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Resolves the session cookie and stashes the result as a [`CurrentUser`]
/// request extension for every handler and extractor further down.
pub async fn load_current_user(
    State(db): State<Arc<DbClient>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let user = resolve_current_user(&db, &jar).await?;
    request.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(request).await)
}

/// Unknown, malformed, expired and dangling sessions all count as "not
/// logged in".
pub async fn resolve_current_user(db: &DbClient, jar: &CookieJar) -> Result<Option<User>> {
    let Some(token_hash) = presented_token_hash(jar)? else {
        return Ok(None);
    };

    let Some(session) = db.fetch_session(&token_hash).await? else {
        debug!("Session cookie does not match any session");
        return Ok(None);
    };

    if session.is_expired_at(UtcDateTime::now()) {
        debug!(user_id = %session.user, "Session expired");
        db.delete_session(&token_hash).await?;
        return Ok(None);
    }

    let user = db.fetch_user(session.user).await?;
    if user.is_none() {
        warn!(user_id = %session.user, "Session refers to a user that does not exist");
    }

    Ok(user)
}

/// Drops whatever session the request presented, then starts a new one for
/// `user`.
pub async fn login(
    db: &DbClient,
    config: SessionConfig,
    jar: CookieJar,
    user: &User,
) -> Result<CookieJar> {
    let jar = logout(db, jar).await?;

    let token = SessionToken::generate_random();
    let session = Session {
        user: user.id,
        token_hash: token.hash()?,
        created_at: UtcDateTime::now(),
        expires_after: config.lifetime,
    };
    db.create_session(&session).await?;

    Ok(jar.add(config.session_cookie(&token)))
}

pub async fn logout(db: &DbClient, jar: CookieJar) -> Result<CookieJar> {
    if let Some(token_hash) = presented_token_hash(&jar)? {
        db.delete_session(&token_hash).await?;
    }

    Ok(jar.remove(Cookie::build(SESSION_COOKIE).path("/")))
}

fn presented_token_hash(jar: &CookieJar) -> Result<Option<SessionTokenHash>> {
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        return Ok(None);
    };

    match cookie.value().parse::<SessionToken>() {
        Ok(token) => Ok(Some(token.hash()?)),
        Err(err) => {
            debug!(error = %err, "Ignoring malformed session cookie");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::server::{
        session::{SESSION_COOKIE, SessionConfig, login, logout, resolve_current_user},
        tests::{delete_user_keeping_sessions, register_user, test_db},
    };
    use axum_extra::extract::cookie::{Cookie, CookieJar};
    use blogwerk_common::model::session::{PositiveDuration, Session, SessionToken};
    use time::{Duration, UtcDateTime};

    fn jar_with(value: &str) -> CookieJar {
        CookieJar::new().add(Cookie::new(SESSION_COOKIE, value.to_owned()))
    }

    #[tokio::test]
    async fn anonymous_without_cookie() {
        let (_dir, db) = test_db().await;

        assert_eq!(resolve_current_user(&db, &CookieJar::new()).await.unwrap(), None);
        assert_eq!(resolve_current_user(&db, &jar_with("garbage")).await.unwrap(), None);

        let unknown = SessionToken::generate_random().as_token_str();
        assert_eq!(resolve_current_user(&db, &jar_with(&unknown)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn login_then_logout() {
        let (_dir, db) = test_db().await;
        let user = register_user(&db, "alice", "pw").await;

        let jar = login(&db, SessionConfig::default(), CookieJar::new(), &user)
            .await
            .unwrap();
        let cookie = jar.get(SESSION_COOKIE).unwrap();
        assert!(cookie.http_only().unwrap_or(false));
        assert_eq!(cookie.max_age(), None);
        assert_eq!(
            resolve_current_user(&db, &jar).await.unwrap(),
            Some(user.clone())
        );

        let stale = jar.clone();
        let jar = logout(&db, jar).await.unwrap();
        assert!(jar.get(SESSION_COOKIE).is_none_or(|cookie| cookie.value().is_empty()));
        assert_eq!(resolve_current_user(&db, &stale).await.unwrap(), None);
    }

    #[tokio::test]
    async fn login_replaces_the_previous_session() {
        let (_dir, db) = test_db().await;
        let alice = register_user(&db, "alice", "pw").await;
        let bob = register_user(&db, "bob", "pw").await;

        let config = SessionConfig::default();
        let first = login(&db, config, CookieJar::new(), &alice).await.unwrap();
        let second = login(&db, config, first.clone(), &bob).await.unwrap();

        assert_eq!(resolve_current_user(&db, &first).await.unwrap(), None);
        assert_eq!(resolve_current_user(&db, &second).await.unwrap(), Some(bob));
    }

    #[tokio::test]
    async fn expired_sessions_are_discarded() {
        let (_dir, db) = test_db().await;
        let user = register_user(&db, "alice", "pw").await;

        let token = SessionToken::generate_random();
        let token_hash = token.hash().unwrap();
        db.create_session(&Session {
            user: user.id,
            token_hash: token_hash.clone(),
            created_at: UtcDateTime::now() - Duration::hours(2),
            expires_after: Some(PositiveDuration::from_seconds(3600).unwrap()),
        })
        .await
        .unwrap();

        let jar = jar_with(&token.as_token_str());
        assert_eq!(resolve_current_user(&db, &jar).await.unwrap(), None);
        assert!(db.fetch_session(&token_hash).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sessions_of_deleted_users_are_anonymous() {
        let (dir, db) = test_db().await;
        let user = register_user(&db, "alice", "pw").await;
        let jar = login(&db, SessionConfig::default(), CookieJar::new(), &user)
            .await
            .unwrap();

        delete_user_keeping_sessions(&dir, user.id).await;

        let token: SessionToken = jar.get(SESSION_COOKIE).unwrap().value().parse().unwrap();
        let session = db.fetch_session(&token.hash().unwrap()).await.unwrap();
        assert_eq!(session.map(|session| session.user), Some(user.id));
        assert!(db.fetch_user(user.id).await.unwrap().is_none());

        assert_eq!(resolve_current_user(&db, &jar).await.unwrap(), None);
    }

    #[tokio::test]
    async fn lifetime_is_sent_as_max_age() {
        let (_dir, db) = test_db().await;
        let user = register_user(&db, "alice", "pw").await;

        let config = SessionConfig {
            lifetime: Some(PositiveDuration::from_seconds(600).unwrap()),
            secure_cookie: true,
        };
        let jar = login(&db, config, CookieJar::new(), &user).await.unwrap();
        let cookie = jar.get(SESSION_COOKIE).unwrap();

        assert_eq!(cookie.max_age(), Some(Duration::seconds(600)));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(resolve_current_user(&db, &jar).await.unwrap(), Some(user));
    }
}
