//! Google OAuth2 provider
//!
//! Only verified email addresses are accepted; the email is the subject and
//! the G Suite hosted domain (`hd`) becomes the identity's domain.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::auth::UserInfo;
use crate::oauth2::http::fetch_json;
use crate::oauth2::types::{OAuthError, ProviderDescriptor, UserInfoFetcher};

/// Registry name
pub const NAME: &str = "google";

/// Default endpoints for Google accounts
#[must_use]
pub fn descriptor() -> ProviderDescriptor {
    ProviderDescriptor {
        name: NAME.to_string(),
        auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
        token_url: "https://oauth2.googleapis.com/token".to_string(),
        default_scopes: "openid email profile".to_string(),
        user_info_url: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct GoogleUser {
    email: String,
    #[serde(default)]
    email_verified: bool,
    name: Option<String>,
    picture: Option<String>,
    hd: Option<String>,
}

/// Maps the OpenID userinfo document onto an identity
#[derive(Debug, Clone, Copy, Default)]
pub struct GoogleFetcher;

#[async_trait]
impl UserInfoFetcher for GoogleFetcher {
    async fn fetch(
        &self,
        client: &reqwest::Client,
        user_info_url: &str,
        access_token: &str,
    ) -> Result<(UserInfo, Value), OAuthError> {
        let raw = fetch_json(client, user_info_url, access_token).await?;
        let user: GoogleUser = super::parse(NAME, &raw)?;

        if !user.email_verified {
            return Err(OAuthError::UserInfoFailed(format!(
                "google email {} is not verified",
                user.email
            )));
        }

        let info = UserInfo {
            name: user.name,
            email: Some(user.email.clone()),
            picture: user.picture,
            domain: user.hd,
            ..UserInfo::new(user.email, NAME)
        };
        Ok((info, raw))
    }
}
