//! Accounts and cookie sessions.
//!
//! Passwords are stored as Argon2id PHC strings. A session token has the shape
//! `<prefix>_<secret>`: the prefix locates the row, and only a SHA-256 digest
//! of the secret is persisted and compared in constant time.

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::repos::{
    CreateSessionParams, CreateUserParams, RepoError, SessionsRepo, UsersRepo,
};
use crate::domain::entities::UserRecord;
use crate::domain::forms::{
    FieldError, FormErrors, NAME_MAX, email_field, optional_text, password_pair, username_field,
};

const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("invalid signup form: {0}")]
    Invalid(FormErrors),
    #[error("username or password is incorrect")]
    InvalidCredentials,
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

#[derive(Debug, Clone, Default)]
pub struct SignupSubmission {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password1: String,
    pub password2: String,
}

/// A freshly issued session; `token` is only ever available here.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UsersRepo>,
    sessions: Arc<dyn SessionsRepo>,
    session_ttl: Duration,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        sessions: Arc<dyn SessionsRepo>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            users,
            sessions,
            session_ttl,
        }
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    pub async fn signup(
        &self,
        submission: SignupSubmission,
    ) -> Result<(UserRecord, IssuedSession), AuthError> {
        let mut errors = FormErrors::new();
        let first_name = errors.check("first_name", optional_text(&submission.first_name, NAME_MAX));
        let last_name = errors.check("last_name", optional_text(&submission.last_name, NAME_MAX));
        let username = errors.check("username", username_field(&submission.username));
        let email = errors.check("email", email_field(&submission.email));
        let password = errors.check(
            "password2",
            password_pair(&submission.password1, &submission.password2),
        );

        if let Some(name) = username.as_deref()
            && self.users.find_user_by_username(name).await?.is_some()
        {
            errors.push("username", FieldError::Taken);
        }

        let (Some(first_name), Some(last_name), Some(username), Some(email), Some(password)) =
            (first_name, last_name, username, email, password)
        else {
            return Err(AuthError::Invalid(errors));
        };
        if !errors.is_empty() {
            return Err(AuthError::Invalid(errors));
        }

        let password_hash = hash_password(&password)?;
        let user = match self
            .users
            .create_user(CreateUserParams {
                username,
                first_name,
                last_name,
                email,
                password_hash,
            })
            .await
        {
            Ok(user) => user,
            Err(RepoError::Duplicate { .. }) => {
                let mut errors = FormErrors::new();
                errors.push("username", FieldError::Taken);
                return Err(AuthError::Invalid(errors));
            }
            Err(err) => return Err(err.into()),
        };

        info!(
            target = "yatube::application::auth",
            user_id = user.id,
            username = %user.username,
            "account created"
        );

        let session = self.issue_session(user.id).await?;
        Ok((user, session))
    }

    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(UserRecord, IssuedSession), AuthError> {
        let user = self
            .users
            .find_user_by_username(username.trim())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash)? {
            warn!(
                target = "yatube::application::auth",
                username = %user.username,
                "rejected login with wrong password"
            );
            return Err(AuthError::InvalidCredentials);
        }

        let session = self.issue_session(user.id).await?;
        Ok((user, session))
    }

    /// Resolve a session cookie to its user. Unknown, malformed and expired tokens yield `None`.
    pub async fn authenticate(&self, token: &str) -> Result<Option<UserRecord>, AuthError> {
        let Some((prefix, secret)) = parse_token(token) else {
            return Ok(None);
        };
        let Some(session) = self.sessions.find_session_by_prefix(prefix).await? else {
            return Ok(None);
        };

        if session.expires_at <= OffsetDateTime::now_utc() {
            return Ok(None);
        }

        let hashed_input = hash_secret(secret);
        if session.hashed_secret.ct_eq(&hashed_input).unwrap_u8() == 0 {
            return Ok(None);
        }

        Ok(self.users.find_user_by_id(session.user_id).await?)
    }

    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        if let Some((prefix, _)) = parse_token(token) {
            self.sessions.delete_session(prefix).await?;
        }
        Ok(())
    }

    pub async fn purge_expired_sessions(&self) -> Result<u64, AuthError> {
        let removed = self
            .sessions
            .delete_expired_sessions(OffsetDateTime::now_utc())
            .await?;
        Ok(removed)
    }

    /// Open a new session for an already authenticated user.
    pub async fn issue_session(&self, user_id: i64) -> Result<IssuedSession, AuthError> {
        let prefix = generate_prefix();
        let secret = generate_secret();
        let expires_at = OffsetDateTime::now_utc() + self.session_ttl;

        self.sessions
            .create_session(CreateSessionParams {
                prefix: prefix.clone(),
                hashed_secret: hash_secret(&secret),
                user_id,
                expires_at,
            })
            .await?;

        Ok(IssuedSession {
            token: format!("{prefix}_{secret}"),
            expires_at,
        })
    }
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::Hashing(err.to_string()))
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, AuthError> {
    let parsed =
        PasswordHash::new(password_hash).map_err(|err| AuthError::Hashing(err.to_string()))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(err) => Err(AuthError::Hashing(err.to_string())),
    }
}

fn hash_secret(secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

fn generate_prefix() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

fn generate_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

fn parse_token(token: &str) -> Option<(&str, &str)> {
    let (prefix, secret) = token.split_once('_')?;
    if prefix.is_empty() || secret.len() < MIN_SECRET_LEN {
        return None;
    }
    Some((prefix, secret))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip() {
        let hash = hash_password("war-and-peace").expect("hash");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("war-and-peace", &hash).expect("verify"));
        assert!(!verify_password("anna-karenina", &hash).expect("verify"));
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(matches!(
            verify_password("x", "not-a-phc-string"),
            Err(AuthError::Hashing(_))
        ));
    }

    #[test]
    fn parse_token_requires_prefix_and_long_secret() {
        let secret = generate_secret();
        let token = format!("abc123_{secret}");
        assert_eq!(parse_token(&token), Some(("abc123", secret.as_str())));
        assert_eq!(parse_token("abc123_short"), None);
        assert_eq!(parse_token(&format!("_{secret}")), None);
        assert_eq!(parse_token("no-separator"), None);
    }

    #[test]
    fn generated_prefix_has_fixed_width() {
        assert_eq!(generate_prefix().len(), 12);
        assert_eq!(generate_secret().len(), 64);
    }
}
