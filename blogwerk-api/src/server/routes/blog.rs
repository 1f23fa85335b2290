use crate::server::{
    Result, ServerError, ServerRouter,
    auth::{AuthenticatedUser, require_author},
    form::Form,
    html::Html,
    pages,
    session::CurrentUser,
};
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::routing::{RouterExt, TypedPath};
use blogwerk_common::model::{
    Id,
    post::{InvalidPostTitleError, Post, PostContent, PostMarker, PostTitle},
};
use blogwerk_db::client::DbClient;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(index)
        .typed_get(create_form)
        .typed_post(create)
        .typed_get(update_form)
        .typed_post(update)
        .typed_post(delete)
}

#[derive(TypedPath)]
#[typed_path("/")]
pub struct IndexPath;

#[derive(TypedPath)]
#[typed_path("/create")]
pub struct CreatePostPath;

#[derive(TypedPath, Deserialize)]
#[typed_path("/{id}/update", rejection(ServerError))]
pub struct UpdatePostPath {
    pub id: Id<PostMarker>,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/{id}/delete", rejection(ServerError))]
pub struct DeletePostPath {
    pub id: Id<PostMarker>,
}

/// Missing fields count as empty ones.
#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
#[serde(default)]
struct PostForm {
    title: String,
    body: String,
}

impl PostForm {
    fn validate(&self) -> Result<PostContent, InvalidPostTitleError> {
        Ok(PostContent {
            title: PostTitle::new(self.title.clone())?,
            body: self.body.clone(),
        })
    }
}

async fn index(
    _: IndexPath,
    CurrentUser(current_user): CurrentUser,
    State(db): State<Arc<DbClient>>,
) -> Result<Html> {
    let posts = db.fetch_posts().await?;

    Ok(pages::index(current_user.as_ref(), &posts))
}

async fn create_form(_: CreatePostPath, user: AuthenticatedUser) -> Html {
    pages::create(user.user(), None, "", "")
}

async fn create(
    _: CreatePostPath,
    user: AuthenticatedUser,
    State(db): State<Arc<DbClient>>,
    Form(form): Form<PostForm>,
) -> Result<Response> {
    let content = match form.validate() {
        Ok(content) => content,
        Err(err) => {
            let error = err.to_string();
            return Ok(pages::create(user.user(), Some(&error), &form.title, &form.body)
                .into_response());
        }
    };

    let post_id = db.create_post(&content, user.user_id()).await?;
    info!(%post_id, user_id = %user.user_id(), "Created post");

    Ok(Redirect::to(IndexPath::PATH).into_response())
}

/// Fetches the post and checks that `user` may change it. A missing post is
/// reported before authorship is looked at.
async fn fetch_owned_post(
    db: &DbClient,
    post_id: Id<PostMarker>,
    user: &AuthenticatedUser,
) -> Result<Post> {
    let post = db
        .fetch_post(post_id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(post_id))?;

    require_author(&post, user)?;

    Ok(post)
}

async fn update_form(
    UpdatePostPath { id }: UpdatePostPath,
    user: AuthenticatedUser,
    State(db): State<Arc<DbClient>>,
) -> Result<Html> {
    let post = fetch_owned_post(&db, id, &user).await?;

    Ok(pages::update(
        user.user(),
        &post,
        None,
        post.content.title.get(),
        &post.content.body,
    ))
}

/// The form body is only looked at once the post exists and belongs to `user`.
async fn update(
    UpdatePostPath { id }: UpdatePostPath,
    user: AuthenticatedUser,
    State(db): State<Arc<DbClient>>,
    form: Result<Form<PostForm>>,
) -> Result<Response> {
    let post = fetch_owned_post(&db, id, &user).await?;
    let Form(form) = form?;

    let content = match form.validate() {
        Ok(content) => content,
        Err(err) => {
            let error = err.to_string();
            return Ok(
                pages::update(user.user(), &post, Some(&error), &form.title, &form.body)
                    .into_response(),
            );
        }
    };

    if !db.update_post(post.id, &content).await? {
        return Err(ServerError::PostByIdNotFound(post.id));
    }
    info!(post_id = %post.id, user_id = %user.user_id(), "Updated post");

    Ok(Redirect::to(IndexPath::PATH).into_response())
}

async fn delete(
    DeletePostPath { id }: DeletePostPath,
    user: AuthenticatedUser,
    State(db): State<Arc<DbClient>>,
) -> Result<Redirect> {
    let post = fetch_owned_post(&db, id, &user).await?;

    if !db.delete_post(post.id).await? {
        return Err(ServerError::PostByIdNotFound(post.id));
    }
    info!(post_id = %post.id, user_id = %user.user_id(), "Deleted post");

    Ok(Redirect::to(IndexPath::PATH))
}
