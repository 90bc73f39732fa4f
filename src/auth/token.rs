//! Signed, time-limited access tokens.
//!
//! Tokens are compact JWS strings (`header.claims.signature`, base64url
//! without padding) signed with HMAC-SHA256 over `header.claims`. Claims are
//! `{"sub": <username>, "exp": <unix seconds>}`. Nothing is persisted:
//! a token is valid while its signature checks out and `now <= exp`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{ApiError, AuthFailure};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HS256";

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
}

/// Issues and verifies access tokens with one secret and lifetime.
#[derive(Clone)]
pub struct TokenService {
    secret: Vec<u8>,
    lifetime: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: impl AsRef<[u8]>, lifetime: Duration) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            lifetime,
        }
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size")
    }

    /// Issues a token for `subject` expiring `lifetime` after `now`.
    ///
    /// Fails when `now + lifetime` falls outside the representable range.
    pub fn issue_at(&self, subject: &str, now: DateTime<Utc>) -> Result<String, ApiError> {
        let expires_at = now.checked_add_signed(self.lifetime).ok_or_else(|| {
            ApiError::internal(anyhow::anyhow!(
                "token lifetime {} overflows the clock",
                self.lifetime
            ))
        })?;
        let header = Header {
            alg: ALGORITHM.to_string(),
            typ: "JWT".to_string(),
        };
        let claims = Claims {
            sub: subject.to_string(),
            exp: expires_at.timestamp(),
        };
        // Both structs are plain strings and integers; serialization cannot fail.
        let header_json = serde_json::to_vec(&header).unwrap_or_default();
        let claims_json = serde_json::to_vec(&claims).unwrap_or_default();

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header_json),
            URL_SAFE_NO_PAD.encode(claims_json)
        );
        let mut mac = self.mac();
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{}.{}", signing_input, signature))
    }

    pub fn issue(&self, subject: &str) -> Result<String, ApiError> {
        self.issue_at(subject, Utc::now())
    }

    /// Checks signature and expiry at `now`; returns the bound username.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<String, AuthFailure> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(sig_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthFailure::InvalidToken);
        };

        let signature = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| AuthFailure::InvalidToken)?;
        let mut mac = self.mac();
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AuthFailure::InvalidToken)?;

        let header: Header = decode_segment(header_b64)?;
        if header.alg != ALGORITHM {
            return Err(AuthFailure::InvalidToken);
        }
        let claims: Claims = decode_segment(claims_b64)?;
        if claims.sub.is_empty() {
            return Err(AuthFailure::InvalidToken);
        }
        if now.timestamp() > claims.exp {
            return Err(AuthFailure::Expired);
        }

        Ok(claims.sub)
    }

    pub fn verify(&self, token: &str) -> Result<String, AuthFailure> {
        self.verify_at(token, Utc::now())
    }
}

fn decode_segment<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, AuthFailure> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthFailure::InvalidToken)?;
    serde_json::from_slice(&bytes).map_err(|_| AuthFailure::InvalidToken)
}
