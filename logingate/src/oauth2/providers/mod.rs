//! Built-in OAuth2 providers

pub mod github;
pub mod gitlab;
pub mod google;

pub use github::GitHubFetcher;
pub use gitlab::GitLabFetcher;
pub use google::GoogleFetcher;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::types::OAuthError;

/// Deserialize a provider answer, mapping failures to a user-info error
pub(crate) fn parse<T: DeserializeOwned>(provider: &str, raw: &Value) -> Result<T, OAuthError> {
    serde_json::from_value(raw.clone())
        .map_err(|e| OAuthError::UserInfoFailed(format!("Failed to parse {provider} user: {e}")))
}
