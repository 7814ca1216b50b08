//! Error types and error handling
//!
//! Each concern owns its error enum; [`LoginError`] aggregates them for the
//! request pipeline. Configuration errors surface at startup only, never at
//! request time.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

pub use crate::backends::BackendError;
pub use crate::claims::ClaimsError;
pub use crate::oauth2::OAuthError;
pub use crate::template::TemplateError;
pub use crate::token::TokenError;

/// Startup configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration sources could not be merged or deserialized
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// A backend name has no registered factory
    #[error("unknown backend: {0}")]
    UnknownBackend(String),

    /// An OAuth2 provider name has no registered descriptor
    #[error("unknown oauth2 provider: {0}")]
    UnknownProvider(String),

    /// A required option is missing
    #[error("{component}: missing required parameter '{parameter}'")]
    MissingParameter {
        /// Backend or provider the option belongs to
        component: String,
        /// Name of the missing option
        parameter: String,
    },

    /// An option value could not be interpreted
    #[error("{component}: invalid value for '{parameter}': {reason}")]
    InvalidParameter {
        /// Backend or provider the option belongs to
        component: String,
        /// Name of the offending option
        parameter: String,
        /// Why the value was rejected
        reason: String,
    },

    /// Configuration is self-contradictory
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// A file referenced by the configuration could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path of the file
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Load(Box::new(err))
    }
}

/// Request-level login error
///
/// Authentication failures are not errors; they travel as `Ok(None)`.
/// Everything here is an upstream, protocol or rendering failure and is
/// answered with a generic message while the detail goes to the log.
#[derive(Debug, Error)]
pub enum LoginError {
    /// Credential backend failed
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// OAuth2 flow failed
    #[error("oauth2 error: {0}")]
    OAuth(#[from] OAuthError),

    /// Claims resolution failed
    #[error("claims error: {0}")]
    Claims(#[from] ClaimsError),

    /// Token signing or verification failed
    #[error("token error: {0}")]
    Token(#[from] TokenError),

    /// Login form rendering failed
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// Request body could not be read
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for LoginError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, format!("Bad Request: {msg}")).into_response()
            }
            Self::OAuth(OAuthError::UnknownProvider(_)) => {
                (StatusCode::NOT_FOUND, "Not Found").into_response()
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response(),
        }
    }
}
