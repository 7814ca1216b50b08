//! Core OAuth2 types
//!
//! Provider descriptors, the user-info capability and the error type shared
//! by the registry, the flow manager and the providers.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::auth::UserInfo;

/// Static description of an OAuth2 provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDescriptor {
    /// Registry name, also the path segment below the login path
    pub name: String,
    /// Authorization endpoint
    pub auth_url: String,
    /// Token endpoint
    pub token_url: String,
    /// Scope requested when the configuration sets none
    pub default_scopes: String,
    /// User-info endpoint
    pub user_info_url: String,
}

/// Fetches the identity behind an access token
#[async_trait]
pub trait UserInfoFetcher: Send + Sync {
    /// Resolve `access_token` into an identity and the provider's raw answer
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be reached, answers with a
    /// non-200 status or sends a body that does not describe a usable user.
    async fn fetch(
        &self,
        client: &reqwest::Client,
        user_info_url: &str,
        access_token: &str,
    ) -> Result<(UserInfo, Value), OAuthError>;
}

/// A registered provider: descriptor plus user-info capability
#[derive(Clone)]
pub struct Provider {
    /// Endpoints and defaults
    pub descriptor: ProviderDescriptor,
    /// User-info capability
    pub fetcher: Arc<dyn UserInfoFetcher>,
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// OAuth2 errors
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// No provider configured under this name
    #[error("Unknown OAuth2 provider: {0}")]
    UnknownProvider(String),

    /// The provider redirected back with an `error` parameter
    #[error("OAuth2 provider returned an error: {0}")]
    Provider(String),

    /// State cookie missing or different from the `state` parameter
    #[error("OAuth2 state token mismatch (potential CSRF attack)")]
    StateMismatch,

    /// Callback carried neither `code` nor `error`
    #[error("OAuth2 callback without authorization code")]
    MissingCode,

    /// Authorization code exchange failed
    #[error("Failed to exchange authorization code for token: {0}")]
    TokenExchangeFailed(String),

    /// Failed to fetch user info
    #[error("Failed to fetch user information: {0}")]
    UserInfoFailed(String),

    /// Request to the provider failed
    #[error("OAuth2 request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Redirect URI could not be derived from the request
    #[error("Cannot derive redirect URI: {0}")]
    RedirectUri(String),
}
