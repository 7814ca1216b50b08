//! GitHub OAuth2 provider

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::auth::UserInfo;
use crate::oauth2::http::fetch_json;
use crate::oauth2::types::{OAuthError, ProviderDescriptor, UserInfoFetcher};

/// Registry name
pub const NAME: &str = "github";

/// Default endpoints for github.com
#[must_use]
pub fn descriptor() -> ProviderDescriptor {
    ProviderDescriptor {
        name: NAME.to_string(),
        auth_url: "https://github.com/login/oauth/authorize".to_string(),
        token_url: "https://github.com/login/oauth/access_token".to_string(),
        default_scopes: String::new(),
        user_info_url: "https://api.github.com/user".to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    login: String,
    name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

/// Maps `GET /user` onto an identity; the login name is the subject
#[derive(Debug, Clone, Copy, Default)]
pub struct GitHubFetcher;

#[async_trait]
impl UserInfoFetcher for GitHubFetcher {
    async fn fetch(
        &self,
        client: &reqwest::Client,
        user_info_url: &str,
        access_token: &str,
    ) -> Result<(UserInfo, Value), OAuthError> {
        let raw = fetch_json(client, user_info_url, access_token).await?;
        let user: GitHubUser = super::parse(NAME, &raw)?;

        let info = UserInfo {
            name: user.name,
            email: user.email,
            picture: user.avatar_url,
            ..UserInfo::new(user.login, NAME)
        };
        Ok((info, raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth2::http::client;
    use std::time::Duration;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_user() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("authorization", "Bearer gh-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "login": "octocat",
                "name": "The Octocat",
                "email": null,
                "avatar_url": "https://avatars.githubusercontent.com/u/583231"
            })))
            .mount(&server)
            .await;

        let http = client(Duration::from_secs(5)).unwrap();
        let (user, raw) = GitHubFetcher.fetch(&http, &server.uri(), "gh-token").await.unwrap();

        assert_eq!(user.sub, "octocat");
        assert_eq!(user.origin, "github");
        assert_eq!(user.name.as_deref(), Some("The Octocat"));
        assert!(user.email.is_none());
        assert_eq!(raw["login"], "octocat");
    }

    #[tokio::test]
    async fn test_missing_login_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 1})))
            .mount(&server)
            .await;

        let http = client(Duration::from_secs(5)).unwrap();
        let err = GitHubFetcher.fetch(&http, &server.uri(), "t").await.unwrap_err();
        assert!(matches!(err, OAuthError::UserInfoFailed(_)));
    }
}
