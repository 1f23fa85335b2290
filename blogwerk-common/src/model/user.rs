use crate::model::{Id, password::PasswordHash};
use thiserror::Error;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct User {
    pub id: Id<UserMarker>,
    pub username: Username,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreateUser {
    pub username: Username,
    pub password_hash: PasswordHash,
}

/// A user together with the hash their password has to match.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: PasswordHash,
}

impl UserCredentials {
    /// Returns the user if `password` matches the stored hash.
    #[must_use]
    pub fn authenticate(self, password: &str) -> Option<User> {
        self.password_hash.verify(password).then_some(self.user)
    }
}

/// Usernames are compared case-sensitively.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct Username(String);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Username is required.")]
pub struct InvalidUsernameError;

impl Username {
    pub fn new(username: String) -> Result<Self, InvalidUsernameError> {
        if username.is_empty() {
            Err(InvalidUsernameError)
        } else {
            Ok(Username(username))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}
