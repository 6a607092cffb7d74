//! Authentication Service
//!
//! Registration (argon2 hash) and credential login with opaque token
//! minting. Session records are created by the connection handler so that
//! presence stays tied to the live connection.

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::RngCore;

use crate::domain::{User, UserRepository};
use crate::shared::validation::{validate_password, validate_username};

/// Authentication errors. The display strings go to clients verbatim.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("user already exists")]
    UserAlreadyExists,

    #[error("user not found")]
    UserNotFound,

    #[error("invalid password")]
    InvalidPassword,

    #[error("{0}")]
    InvalidInput(&'static str),

    #[error("internal error: {0}")]
    Internal(String),
}

pub struct AuthService {
    users: Arc<dyn UserRepository>,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// Hash a password using Argon2id.
    fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Internal(format!("password hashing failed: {e}")))
    }

    /// Verify a password against its stored hash.
    fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| AuthError::Internal(format!("invalid password hash: {e}")))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    /// Create an account with the initial score.
    ///
    /// The username probe catches the common case; a concurrent duplicate
    /// loses on the database unique constraint and surfaces the same way.
    pub async fn register(&self, username: &str, password: &str) -> Result<User, AuthError> {
        validate_username(username).map_err(AuthError::InvalidInput)?;
        validate_password(password).map_err(AuthError::InvalidInput)?;

        if self
            .users
            .find_by_username(username)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?
            .is_some()
        {
            return Err(AuthError::UserAlreadyExists);
        }

        let password_hash = self.hash_password(password)?;

        match self.users.create(username, &password_hash).await {
            Ok(user) => Ok(user),
            Err(e) if e.is_conflict() => Err(AuthError::UserAlreadyExists),
            Err(e) => Err(AuthError::Internal(e.to_string())),
        }
    }

    /// Verify credentials and mint a fresh opaque token.
    pub async fn login(&self, username: &str, password: &str) -> Result<(User, String), AuthError> {
        let user = self
            .users
            .find_by_username(username)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?
            .ok_or(AuthError::UserNotFound)?;

        if !self.verify_password(password, &user.password_hash)? {
            return Err(AuthError::InvalidPassword);
        }

        Ok((user, generate_token()))
    }
}

/// 32 random bytes, hex-encoded: a 64-character opaque session token.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
