use crate::record::{
    FullPostRecord, SessionRecord, UserCredentialsRecord, UserRecord, to_primitive,
};
use blogwerk_common::model::{
    Id, ModelValidationError,
    post::{Post, PostContent, PostMarker},
    session::{Session, SessionTokenHash},
    user::{CreateUser, User, UserCredentials, UserMarker, Username},
};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

const SCHEMA: &str = include_str!("schema.sql");
const DROP_SCHEMA: &str = include_str!("drop.sql");

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("User {} is already registered.", .0.get())]
    UsernameTaken(Username),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Every method checks a connection out of the pool for the duration of one
/// statement; it goes back to the pool when the method returns, on success or
/// failure.
#[derive(Debug)]
pub struct DbClient {
    pool: SqlitePool,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (and creates, if missing) the database at `url`.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        Ok(Self::new(pool))
    }

    /// Creates any missing tables. Existing data is left alone.
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;

        info!("Database schema is up to date");
        Ok(())
    }

    /// Drops every table and recreates the schema from scratch.
    pub async fn reset_schema(&self) -> Result<()> {
        sqlx::raw_sql(DROP_SCHEMA).execute(&self.pool).await?;
        self.init_schema().await
    }

    pub async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(
            "
            SELECT
                user.id,
                user.username
            FROM
                user
            WHERE
                user.id = ?
            ",
        )
        .bind(user_id.get())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    pub async fn fetch_user_credentials(&self, username: &str) -> Result<Option<UserCredentials>> {
        let record = sqlx::query_as::<_, UserCredentialsRecord>(
            "
            SELECT
                user.id,
                user.username,
                user.password
            FROM
                user
            WHERE
                user.username = ?
            ",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        let credentials = record.map(UserCredentials::try_from).transpose()?;
        Ok(credentials)
    }

    /// Fails with [`DbError::UsernameTaken`] if the username is already in use.
    pub async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let user_id = sqlx::query_scalar::<_, i64>(
            "
            INSERT INTO user (username, password)
            VALUES (?, ?)
            RETURNING id
            ",
        )
        .bind(user.username.get())
        .bind(user.password_hash.get())
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DbError::UsernameTaken(user.username.clone())
            }
            err => DbError::Sqlx(err),
        })?;

        Ok(User {
            id: user_id.into(),
            username: user.username.clone(),
        })
    }

    pub async fn fetch_session(&self, token_hash: &SessionTokenHash) -> Result<Option<Session>> {
        let record = sqlx::query_as::<_, SessionRecord>(
            "
            SELECT
                session.token_hash,
                session.user_id,
                session.created,
                session.expires_after_seconds
            FROM
                session
            WHERE
                session.token_hash = ?
            ",
        )
        .bind(&token_hash.0[..])
        .fetch_optional(&self.pool)
        .await?;

        let session = record.map(Session::try_from).transpose()?;
        Ok(session)
    }

    pub async fn create_session(&self, session: &Session) -> Result<()> {
        sqlx::query(
            "
            INSERT INTO session (token_hash, user_id, created, expires_after_seconds)
            VALUES (?, ?, ?, ?)
            ",
        )
        .bind(&session.token_hash.0[..])
        .bind(session.user.get())
        .bind(to_primitive(session.created_at))
        .bind(
            session
                .expires_after
                .map(|expires_after| expires_after.whole_seconds()),
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Returns whether a session was removed.
    pub async fn delete_session(&self, token_hash: &SessionTokenHash) -> Result<bool> {
        let result = sqlx::query("DELETE FROM session WHERE session.token_hash = ?")
            .bind(&token_hash.0[..])
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// All posts, newest first.
    pub async fn fetch_posts(&self) -> Result<Vec<Post>> {
        let records = sqlx::query_as::<_, FullPostRecord>(
            "
            SELECT
                post.id,
                post.title,
                post.body,
                post.created,
                post.author_id,
                user.username
            FROM
                post JOIN user ON post.author_id = user.id
            ORDER BY
                post.created DESC,
                post.id DESC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let posts = records
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<_, _>>()?;
        Ok(posts)
    }

    pub async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let record = sqlx::query_as::<_, FullPostRecord>(
            "
            SELECT
                post.id,
                post.title,
                post.body,
                post.created,
                post.author_id,
                user.username
            FROM
                post JOIN user ON post.author_id = user.id
            WHERE
                post.id = ?
            ",
        )
        .bind(post_id.get())
        .fetch_optional(&self.pool)
        .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    pub async fn create_post(
        &self,
        content: &PostContent,
        author: Id<UserMarker>,
    ) -> Result<Id<PostMarker>> {
        let post_id = sqlx::query_scalar::<_, i64>(
            "
            INSERT INTO post (title, body, author_id)
            VALUES (?, ?, ?)
            RETURNING id
            ",
        )
        .bind(content.title.get())
        .bind(&content.body)
        .bind(author.get())
        .fetch_one(&self.pool)
        .await?;

        Ok(post_id.into())
    }

    /// Returns whether a post was updated.
    pub async fn update_post(&self, post_id: Id<PostMarker>, content: &PostContent) -> Result<bool> {
        let result = sqlx::query("UPDATE post SET title = ?, body = ? WHERE post.id = ?")
            .bind(content.title.get())
            .bind(&content.body)
            .bind(post_id.get())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Returns whether a post was removed.
    pub async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let result = sqlx::query("DELETE FROM post WHERE post.id = ?")
            .bind(post_id.get())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::client::{DbClient, DbError};
    use blogwerk_common::model::{
        Id,
        password::Password,
        post::{PostContent, PostTitle},
        session::{PositiveDuration, Session, SessionToken},
        user::{CreateUser, User, Username},
    };
    use tempfile::TempDir;
    use time::UtcDateTime;

    async fn test_client() -> (TempDir, DbClient) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("test.sqlite").display());

        let client = DbClient::connect(&url).await.unwrap();
        client.init_schema().await.unwrap();

        (dir, client)
    }

    async fn register(client: &DbClient, username: &str, password: &str) -> User {
        let user = CreateUser {
            username: Username::new(username.to_owned()).unwrap(),
            password_hash: Password::new(password.to_owned()).unwrap().hash().unwrap(),
        };

        client.create_user(&user).await.unwrap()
    }

    fn content(title: &str, body: &str) -> PostContent {
        PostContent {
            title: PostTitle::new(title.to_owned()).unwrap(),
            body: body.to_owned(),
        }
    }

    #[tokio::test]
    async fn usernames_are_unique() {
        let (_dir, client) = test_client().await;

        let user = register(&client, "test", "pw").await;
        assert_eq!(client.fetch_user(user.id).await.unwrap(), Some(user));

        let duplicate = CreateUser {
            username: Username::new("test".to_owned()).unwrap(),
            password_hash: Password::new("other".to_owned()).unwrap().hash().unwrap(),
        };
        let err = client.create_user(&duplicate).await.unwrap_err();
        assert!(matches!(err, DbError::UsernameTaken(_)));
        assert_eq!(err.to_string(), "User test is already registered.");

        register(&client, "Test", "pw").await;
    }

    #[tokio::test]
    async fn credentials_are_looked_up_by_username() {
        let (_dir, client) = test_client().await;
        let user = register(&client, "alice", "secret").await;

        let credentials = client.fetch_user_credentials("alice").await.unwrap().unwrap();
        assert_eq!(credentials.clone().authenticate("secret"), Some(user));
        assert_eq!(credentials.authenticate("wrong"), None);

        assert!(client.fetch_user_credentials("ALICE").await.unwrap().is_none());
        assert!(client.fetch_user(Id::new(999)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn post_lifecycle() {
        let (_dir, client) = test_client().await;
        let author = register(&client, "author", "pw").await;

        let first = client.create_post(&content("first", "1"), author.id).await.unwrap();
        let second = client.create_post(&content("second", ""), author.id).await.unwrap();

        let posts = client.fetch_posts().await.unwrap();
        let ids: Vec<_> = posts.iter().map(|post| post.id).collect();
        assert_eq!(ids, [second, first]);
        assert_eq!(posts[1].author, author);
        assert_eq!(posts[1].content, content("first", "1"));

        assert!(client.update_post(first, &content("edited", "body")).await.unwrap());
        let edited = client.fetch_post(first).await.unwrap().unwrap();
        assert_eq!(edited.content, content("edited", "body"));
        assert_eq!(edited.created, posts[1].created);

        assert!(client.delete_post(first).await.unwrap());
        assert!(client.fetch_post(first).await.unwrap().is_none());
        assert!(!client.delete_post(first).await.unwrap());
        assert!(!client.update_post(first, &content("x", "")).await.unwrap());
    }

    #[tokio::test]
    async fn posts_need_an_existing_author() {
        let (_dir, client) = test_client().await;

        let result = client.create_post(&content("orphan", ""), Id::new(42)).await;
        assert!(matches!(result, Err(DbError::Sqlx(_))));
        assert!(client.fetch_posts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sessions_are_keyed_by_token_hash() {
        let (_dir, client) = test_client().await;
        let user = register(&client, "alice", "pw").await;

        let token_hash = SessionToken::generate_random().hash().unwrap();
        let session = Session {
            user: user.id,
            token_hash: token_hash.clone(),
            created_at: UtcDateTime::now(),
            expires_after: Some(PositiveDuration::from_seconds(3600).unwrap()),
        };
        client.create_session(&session).await.unwrap();

        let fetched = client.fetch_session(&token_hash).await.unwrap().unwrap();
        assert_eq!(fetched.user, user.id);
        assert_eq!(fetched.expires_after, session.expires_after);
        assert_eq!(
            fetched.created_at.unix_timestamp(),
            session.created_at.unix_timestamp()
        );

        let other_hash = SessionToken::generate_random().hash().unwrap();
        assert!(client.fetch_session(&other_hash).await.unwrap().is_none());

        assert!(client.delete_session(&token_hash).await.unwrap());
        assert!(client.fetch_session(&token_hash).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reset_schema_drops_all_rows() {
        let (_dir, client) = test_client().await;
        let user = register(&client, "alice", "pw").await;
        client.create_post(&content("t", "b"), user.id).await.unwrap();

        client.reset_schema().await.unwrap();

        assert!(client.fetch_user(user.id).await.unwrap().is_none());
        assert!(client.fetch_posts().await.unwrap().is_empty());
    }
}
