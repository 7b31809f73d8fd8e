//! Authentication error types.

use http::StatusCode;
use thiserror::Error;

use crate::error::BoxError;

/// Everything [`Auth`](super::Auth) can fail with.
///
/// No failure path ever yields partially populated claims: a caller either
/// gets verified [`Claims`](super::Claims) or one of these.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("expected authorization header format: Bearer <token>")]
    MalformedHeader,

    #[error("error parsing token: {0}")]
    InvalidToken(String),

    #[error("kid missing from token header")]
    MissingKid,

    #[error("failed to fetch public key: {0}")]
    KeyLookup(#[from] KeyLookupError),

    #[error("authentication failed: {0}")]
    Policy(#[source] PolicyError),

    #[error("user {subject} is not enabled")]
    UserDisabled { subject: String },

    #[error("checking user status: {0}")]
    UserLookup(#[source] BoxError),

    #[error("attempted action is not allowed: {0}")]
    Forbidden(#[source] PolicyError),

    #[error("claims missing from request")]
    MissingClaims,

    #[error("signing token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

impl AuthError {
    /// The status a client receives for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

/// Failures of the key authority.
#[derive(Debug, Error)]
pub enum KeyLookupError {
    #[error("key {kid} not found")]
    NotFound { kid: String },

    #[error("key {kid}: {source}")]
    Backend {
        kid: String,
        #[source]
        source: BoxError,
    },
}

/// A policy hook's verdict against a token or an action.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("{0}")]
    Denied(String),

    #[error(transparent)]
    Token(#[from] jsonwebtoken::errors::Error),
}
