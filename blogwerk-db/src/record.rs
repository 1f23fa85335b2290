use blogwerk_common::model::{
    ModelValidationError,
    password::PasswordHash,
    post::{Post, PostContent, PostTitle},
    session::{PositiveDuration, Session},
    user::{User, UserCredentials, Username},
};
use sqlx::FromRow;
use time::{PrimitiveDateTime, UtcDateTime};

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub id: i64,
    pub username: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct UserCredentialsRecord {
    pub id: i64,
    pub username: String,
    pub password: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct FullPostRecord {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub created: PrimitiveDateTime,
    pub author_id: i64,
    pub username: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct SessionRecord {
    pub token_hash: Vec<u8>,
    pub user_id: i64,
    pub created: PrimitiveDateTime,
    pub expires_after_seconds: Option<i64>,
}

/// SQLite has no timezone aware type, every stored timestamp is UTC.
pub(crate) fn to_primitive(value: UtcDateTime) -> PrimitiveDateTime {
    PrimitiveDateTime::new(value.date(), value.time())
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id.into(),
            username: Username::new(value.username)?,
        })
    }
}

impl TryFrom<UserCredentialsRecord> for UserCredentials {
    type Error = ModelValidationError;

    fn try_from(value: UserCredentialsRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: User {
                id: value.id.into(),
                username: Username::new(value.username)?,
            },
            password_hash: PasswordHash::new(value.password)?,
        })
    }
}

impl TryFrom<FullPostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: FullPostRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id.into(),
            author: User {
                id: value.author_id.into(),
                username: Username::new(value.username)?,
            },
            content: PostContent {
                title: PostTitle::new(value.title)?,
                body: value.body,
            },
            created: value.created.as_utc(),
        })
    }
}

impl TryFrom<SessionRecord> for Session {
    type Error = ModelValidationError;

    fn try_from(value: SessionRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: value.user_id.into(),
            token_hash: value.token_hash.into_boxed_slice().try_into()?,
            created_at: value.created.as_utc(),
            expires_after: value
                .expires_after_seconds
                .map(PositiveDuration::from_seconds)
                .transpose()?,
        })
    }
}
