use argon2::{
    Argon2, PasswordHasher, PasswordVerifier,
    password_hash::{self, SaltString},
};
use std::fmt::{Debug, Formatter};
use thiserror::Error;

pub const PASSWORD_SALT_LEN: usize = 16;

/// Same algorithm and cost as [`Password::hash`]. The salt and output are
/// arbitrary bytes, so no password verifies against it.
const PLACEHOLDER_PASSWORD_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$k14UBTqx011lY0RXGTGe+Q$QJLZe30bIv8YcRerIXx583wfFpYl5ca0ADgxxfdKEIo";

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Password is required.")]
pub struct InvalidPasswordError;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing password failed: {0}")]
pub struct PasswordHashError(password_hash::Error);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The stored password hash is not a valid PHC string")]
pub struct InvalidPasswordHashError;

/// A plaintext password as submitted on registration. Only lives for the
/// duration of the request that hashes it.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct Password(String);

/// An argon2 PHC string, the only form in which passwords are stored.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct PasswordHash(String);

impl Password {
    pub fn new(password: String) -> Result<Self, InvalidPasswordError> {
        if password.is_empty() {
            Err(InvalidPasswordError)
        } else {
            Ok(Self(password))
        }
    }

    pub fn hash(&self) -> Result<PasswordHash, PasswordHashError> {
        let salt_bytes: [u8; PASSWORD_SALT_LEN] = rand::random();
        let salt = SaltString::encode_b64(&salt_bytes).map_err(PasswordHashError)?;

        let hash = Argon2::default()
            .hash_password(self.0.as_bytes(), &salt)
            .map_err(PasswordHashError)?;

        Ok(PasswordHash(hash.to_string()))
    }
}

impl PasswordHash {
    pub fn new(phc: String) -> Result<Self, InvalidPasswordHashError> {
        argon2::PasswordHash::new(&phc).map_err(|_| InvalidPasswordHashError)?;

        Ok(Self(phc))
    }

    /// Stands in for the stored hash of a user that does not exist, so that
    /// rejecting an unknown username takes as long as rejecting a wrong
    /// password.
    #[must_use]
    pub fn placeholder() -> Self {
        Self(PLACEHOLDER_PASSWORD_HASH.to_owned())
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn verify(&self, password: &str) -> bool {
        argon2::PasswordHash::new(&self.0).is_ok_and(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
    }
}

impl Debug for Password {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Password").field(&"[redacted]").finish()
    }
}

impl Debug for PasswordHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PasswordHash").field(&"[redacted]").finish()
    }
}
