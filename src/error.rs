//! Error taxonomy shared by the parameter mapper, auth service, retrieval
//! engine, and HTTP layer.
//!
//! Every failure a request can end in is one [`ApiError`] variant; the HTTP
//! layer maps variants to status codes and never inspects message text.
//!
//! | Variant | HTTP status |
//! |---------|-------------|
//! | [`ApiError::InvalidParameter`] | 400 |
//! | [`ApiError::Conflict`] | 400 |
//! | [`ApiError::Unauthorized`] | 401 |
//! | [`ApiError::NotFound`] | 404 |
//! | [`ApiError::ServiceUnavailable`] | 503 |
//! | [`ApiError::Internal`] | 500 |

use thiserror::Error;

/// Why a request failed authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// Unknown username or wrong password.
    InvalidCredentials,
    /// No `Authorization` header, or not the expected scheme.
    MissingToken,
    /// Token could not be decoded or its signature does not match.
    InvalidToken,
    /// Token signature is valid but `exp` is in the past.
    Expired,
}

impl AuthFailure {
    pub fn message(&self) -> &'static str {
        match self {
            AuthFailure::InvalidCredentials => "invalid credentials",
            AuthFailure::MissingToken => "not authenticated",
            AuthFailure::InvalidToken => "invalid token",
            AuthFailure::Expired => "token expired",
        }
    }
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Errors surfaced to API clients.
#[derive(Debug, Error)]
pub enum ApiError {
    /// User-correctable input (bad year, unknown category, short password...).
    #[error("{0}")]
    InvalidParameter(String),

    /// Authentication or token failure.
    #[error("{0}")]
    Unauthorized(AuthFailure),

    /// Duplicate username or email on registration.
    #[error("{0}")]
    Conflict(String),

    /// The remote page was fetched but carries no data table.
    #[error("{0}")]
    NotFound(String),

    /// The remote site is unreachable and no backup exists for the key.
    #[error("{0}")]
    ServiceUnavailable(String),

    /// Anything unexpected; carries the underlying cause text.
    #[error("unexpected error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }

    /// Wraps an unexpected failure, keeping its full cause chain as text.
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(format!("{:#}", err.into()))
    }

    /// Short machine-readable code used in error bodies and logs.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidParameter(_) => "invalid_parameter",
            ApiError::Unauthorized(AuthFailure::Expired) => "token_expired",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Conflict(_) => "conflict",
            ApiError::NotFound(_) => "not_found",
            ApiError::ServiceUnavailable(_) => "service_unavailable",
            ApiError::Internal(_) => "internal",
        }
    }
}
