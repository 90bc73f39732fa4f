//! Salted, adaptive password hashing (Argon2id, PHC string format).

use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use std::sync::OnceLock;

/// Hashes `password` with a fresh random salt.
///
/// The returned PHC string embeds algorithm, parameters and salt, so
/// [`verify_password`] needs nothing else.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut rand::rngs::OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| anyhow!("password hashing failed: {}", e))
}

/// Returns `true` if `password` matches `hash`. An unparseable hash never
/// matches.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Runs one Argon2 verification against a throwaway hash and returns
/// `false`, so a login for an unknown user costs the same as a wrong
/// password.
pub fn verify_dummy(password: &str) -> bool {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    if let Some(hash) = DUMMY.get_or_init(|| hash_password("vitiscrap-dummy").ok()) {
        verify_password(password, hash);
    }
    false
}
