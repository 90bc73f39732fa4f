//! Credential store and token service.
//!
//! [`AuthService`] registers users (hashing their password before it ever
//! reaches the [`Store`]), exchanges username + password for an access
//! token, and verifies bearer tokens on protected routes.

pub mod password;
pub mod token;

use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;

use crate::config::{Config, MAX_TOKEN_EXPIRE_MINUTES};
use crate::error::{ApiError, AuthFailure};
use crate::models::{Identity, NewCredential};
use crate::store::{CredentialInsert, Store};

pub use token::TokenService;

pub const MIN_USERNAME_LEN: usize = 3;
pub const MIN_PASSWORD_LEN: usize = 6;

/// Response body for a successful login.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: &'static str,
}

pub struct AuthService {
    store: Arc<dyn Store>,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>, tokens: TokenService) -> Self {
        Self { store, tokens }
    }

    pub fn from_config(store: Arc<dyn Store>, config: &Config) -> Self {
        let tokens = TokenService::new(
            &config.auth.secret_key,
            Duration::minutes(
                config
                    .auth
                    .token_expire_minutes
                    .clamp(1, MAX_TOKEN_EXPIRE_MINUTES),
            ),
        );
        Self::new(store, tokens)
    }

    /// Creates a user. Username and email must both be unused.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<Identity, ApiError> {
        validate_registration(username, password, email)?;

        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || password::hash_password(&password))
            .await
            .map_err(ApiError::internal)?
            .map_err(ApiError::internal)?;

        let new = NewCredential {
            username: username.to_string(),
            password_hash,
            email: email.to_string(),
        };
        match self
            .store
            .insert_credential(&new)
            .await
            .map_err(ApiError::internal)?
        {
            CredentialInsert::Created(cred) => {
                tracing::info!(username = %cred.username, id = cred.id, "user registered");
                Ok(Identity::from(&cred))
            }
            CredentialInsert::Conflict => Err(ApiError::Conflict(
                "username or email already exists".to_string(),
            )),
        }
    }

    /// Checks `username` / `password` and issues a bearer token.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<IssuedToken, ApiError> {
        let cred = self
            .store
            .find_credential(username)
            .await
            .map_err(ApiError::internal)?;

        // Unknown users still pay for one Argon2 verification.
        let password = password.to_string();
        let hash = cred.as_ref().map(|c| c.password_hash.clone());
        let matches = tokio::task::spawn_blocking(move || match hash {
            Some(hash) => password::verify_password(&password, &hash),
            None => password::verify_dummy(&password),
        })
        .await
        .map_err(ApiError::internal)?;

        let cred = match cred {
            Some(cred) if matches => cred,
            _ => {
                tracing::debug!(%username, "rejected login");
                return Err(ApiError::Unauthorized(AuthFailure::InvalidCredentials));
            }
        };

        Ok(IssuedToken {
            access_token: self.tokens.issue(&cred.username)?,
            token_type: "bearer",
        })
    }

    /// Returns the username bound to a valid, unexpired token.
    pub fn verify(&self, token: &str) -> Result<String, ApiError> {
        self.tokens.verify(token).map_err(ApiError::Unauthorized)
    }
}

fn validate_registration(username: &str, password: &str, email: &str) -> Result<(), ApiError> {
    if username.chars().count() < MIN_USERNAME_LEN {
        return Err(ApiError::invalid(format!(
            "username must be at least {} characters",
            MIN_USERNAME_LEN
        )));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::invalid(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    if !looks_like_email(email) {
        return Err(ApiError::invalid("email is not a valid address"));
    }
    Ok(())
}

/// `local@domain.tld` with no whitespace and a dotted domain.
fn looks_like_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, rest)| !host.is_empty() && !rest.is_empty())
                && !domain.ends_with('.')
        }
        None => false,
    }
}
