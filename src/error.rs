//! Error taxonomy.
//!
//! Everything a handler can fail with is one of a handful of shapes. The
//! [`Errors`](crate::middleware::Errors) middleware looks at the *root* of an
//! error (see [`Error::cause`]) to pick the response, so a handler is free to
//! add context on the way out without changing what the client sees:
//!
//! ```rust
//! use strata::{Error, ResultExt};
//! use http::StatusCode;
//!
//! let lookup: Result<(), Error> = Err(Error::request("task not found", StatusCode::NOT_FOUND));
//! let err = lookup.context("deleting task 42").unwrap_err();
//!
//! assert_eq!(err.to_string(), "deleting task 42: task not found");
//! assert!(matches!(err.cause(), Error::Request { .. }));
//! ```

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::AuthError;

/// A boxed, thread-safe error used for causes the pipeline does not inspect.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by handlers and middleware.
#[derive(Debug, Error)]
pub enum Error {
    /// One or more fields of the request payload failed validation. Always 400.
    #[error("data validation error: {0}")]
    Validation(FieldErrors),

    /// A failure the originating handler has already mapped to a status.
    #[error("{source}")]
    Request {
        source: BoxError,
        status: StatusCode,
    },

    /// Authentication (401) or authorization (403) failure.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The pipeline can no longer guarantee a correct response. Escapes the
    /// error middleware and shuts the process down.
    #[error("{0}")]
    Shutdown(String),

    /// Anything else. Logged in full, answered with a bare 500.
    #[error(transparent)]
    Untrusted(BoxError),

    /// Context added on the way out of a call chain.
    #[error("{context}: {source}")]
    Wrapped {
        context: String,
        source: Box<Error>,
    },
}

impl Error {
    /// A request error carrying the status the client should receive.
    pub fn request(cause: impl Into<BoxError>, status: StatusCode) -> Self {
        Self::Request { source: cause.into(), status }
    }

    pub fn validation(fields: FieldErrors) -> Self {
        Self::Validation(fields)
    }

    pub fn shutdown(message: impl Into<String>) -> Self {
        Self::Shutdown(message.into())
    }

    pub fn untrusted(cause: impl Into<BoxError>) -> Self {
        Self::Untrusted(cause.into())
    }

    /// Wraps `self` with a context message. Classification is unaffected.
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Wrapped { context: context.into(), source: Box::new(self) }
    }

    /// Walks down through [`Error::Wrapped`] layers and returns the innermost
    /// error, which is what the taxonomy classifies.
    pub fn cause(&self) -> &Error {
        let mut err = self;
        while let Self::Wrapped { source, .. } = err {
            err = source;
        }
        err
    }

    /// True when this error, at any wrapping depth, is a shutdown error.
    pub fn is_shutdown(&self) -> bool {
        matches!(self.cause(), Self::Shutdown(_))
    }
}

impl From<BoxError> for Error {
    fn from(e: BoxError) -> Self {
        Self::Untrusted(e)
    }
}

/// Adds context to any fallible result whose error converts into [`Error`].
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T, Error>;
}

impl<T, E: Into<Error>> ResultExt<T> for Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T, Error> {
        self.map_err(|e| e.into().context(context))
    }
}

// ── Validation ────────────────────────────────────────────────────────────────

/// A single field that failed validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub error: String,
}

/// The set of field failures for one payload.
///
/// Displays as the JSON array of its members; that string is what the error
/// envelope's `fields` member carries.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(pub Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, error: impl Into<String>) {
        self.0.push(FieldError { field: field.into(), error: error.into() });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Ok(())` when nothing failed, a validation error otherwise.
    pub fn into_result(self) -> Result<(), Error> {
        if self.is_empty() { Ok(()) } else { Err(Error::Validation(self)) }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(&self.0) {
            Ok(json) => f.write_str(&json),
            Err(e) => write!(f, "{e}"),
        }
    }
}

/// The JSON body written for every error the pipeline answers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<String>,
}

// ── Server ────────────────────────────────────────────────────────────────────

/// Infrastructure failures of the listener itself.
///
/// Application-level failures never show up here; they are answered by the
/// pipeline or escalated through the shutdown channel.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("listener: {0}")]
    Listener(#[source] io::Error),

    #[error("in-flight requests did not drain within {0:?}")]
    ShutdownTimeout(Duration),
}
