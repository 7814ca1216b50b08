//! GitLab OAuth2 provider

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::auth::UserInfo;
use crate::oauth2::http::fetch_json;
use crate::oauth2::types::{OAuthError, ProviderDescriptor, UserInfoFetcher};

/// Registry name
pub const NAME: &str = "gitlab";

/// Default endpoints for gitlab.com; self-hosted instances override them
#[must_use]
pub fn descriptor() -> ProviderDescriptor {
    ProviderDescriptor {
        name: NAME.to_string(),
        auth_url: "https://gitlab.com/oauth/authorize".to_string(),
        token_url: "https://gitlab.com/oauth/token".to_string(),
        default_scopes: "read_user".to_string(),
        user_info_url: "https://gitlab.com/api/v4/user".to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct GitLabUser {
    username: String,
    name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

/// Maps `GET /api/v4/user` onto an identity; the username is the subject
#[derive(Debug, Clone, Copy, Default)]
pub struct GitLabFetcher;

#[async_trait]
impl UserInfoFetcher for GitLabFetcher {
    async fn fetch(
        &self,
        client: &reqwest::Client,
        user_info_url: &str,
        access_token: &str,
    ) -> Result<(UserInfo, Value), OAuthError> {
        let raw = fetch_json(client, user_info_url, access_token).await?;
        let user: GitLabUser = super::parse(NAME, &raw)?;

        let info = UserInfo {
            name: user.name,
            email: user.email,
            picture: user.avatar_url,
            ..UserInfo::new(user.username, NAME)
        };
        Ok((info, raw))
    }
}
