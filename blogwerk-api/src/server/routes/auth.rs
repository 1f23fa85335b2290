use crate::server::{
    Result, ServerRouter,
    form::Form,
    html::Html,
    pages,
    routes::blog::IndexPath,
    session::{self, CurrentUser, SessionConfig},
};
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::{
    extract::CookieJar,
    routing::{RouterExt, TypedPath},
};
use blogwerk_common::model::{
    password::{Password, PasswordHash},
    user::{CreateUser, Username},
};
use blogwerk_db::client::{DbClient, DbError};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Shown for unknown usernames and wrong passwords alike.
pub const INCORRECT_CREDENTIALS: &str = "Incorrect credentials.";

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(register_form)
        .typed_post(register)
        .typed_get(login_form)
        .typed_post(login)
        .typed_get(logout)
}

#[derive(TypedPath)]
#[typed_path("/auth/register")]
pub struct RegisterPath;

#[derive(TypedPath)]
#[typed_path("/auth/login")]
pub struct LoginPath;

#[derive(TypedPath)]
#[typed_path("/auth/logout")]
pub struct LogoutPath;

/// Missing fields count as empty ones.
#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
#[serde(default)]
struct CredentialsForm {
    username: String,
    password: String,
}

async fn register_form(_: RegisterPath, CurrentUser(current_user): CurrentUser) -> Html {
    pages::register(current_user.as_ref(), None, "")
}

async fn register(
    _: RegisterPath,
    CurrentUser(current_user): CurrentUser,
    State(db): State<Arc<DbClient>>,
    Form(form): Form<CredentialsForm>,
) -> Result<Response> {
    let validated = Username::new(form.username.clone())
        .map_err(|err| err.to_string())
        .and_then(|username| {
            Password::new(form.password)
                .map(|password| (username, password))
                .map_err(|err| err.to_string())
        });

    let error = match validated {
        Err(message) => message,
        Ok((username, password)) => {
            let new_user = CreateUser {
                username,
                password_hash: password.hash()?,
            };

            match db.create_user(&new_user).await {
                Ok(user) => {
                    info!(user_id = %user.id, "Registered user");
                    return Ok(Redirect::to(LoginPath::PATH).into_response());
                }
                Err(err @ DbError::UsernameTaken(_)) => err.to_string(),
                Err(err) => return Err(err.into()),
            }
        }
    };

    debug!(%error, "Rejected registration");
    Ok(pages::register(current_user.as_ref(), Some(&error), &form.username).into_response())
}

async fn login_form(_: LoginPath, CurrentUser(current_user): CurrentUser) -> Html {
    pages::login(current_user.as_ref(), None, "")
}

async fn login(
    _: LoginPath,
    CurrentUser(current_user): CurrentUser,
    State(db): State<Arc<DbClient>>,
    State(config): State<SessionConfig>,
    jar: CookieJar,
    Form(form): Form<CredentialsForm>,
) -> Result<Response> {
    let user = match db.fetch_user_credentials(&form.username).await? {
        Some(credentials) => credentials.authenticate(&form.password),
        None => {
            let _ = PasswordHash::placeholder().verify(&form.password);
            None
        }
    };

    let Some(user) = user else {
        debug!("Rejected login attempt");
        return Ok(pages::login(
            current_user.as_ref(),
            Some(INCORRECT_CREDENTIALS),
            &form.username,
        )
        .into_response());
    };

    let jar = session::login(&db, config, jar, &user).await?;
    info!(user_id = %user.id, "Logged in");

    Ok((jar, Redirect::to(IndexPath::PATH)).into_response())
}

async fn logout(
    _: LogoutPath,
    CurrentUser(current_user): CurrentUser,
    State(db): State<Arc<DbClient>>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect)> {
    let jar = session::logout(&db, jar).await?;
    if let Some(user) = current_user {
        info!(user_id = %user.id, "Logged out");
    }

    Ok((jar, Redirect::to(IndexPath::PATH)))
}
