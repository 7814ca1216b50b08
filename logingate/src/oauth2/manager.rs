//! OAuth2 three-legged flow
//!
//! The flow keeps no server-side state. Each request below
//! `{login_path}/{provider}` is classified from its query: without `code` or
//! `error` it starts a flow, otherwise it is the provider's callback. The only
//! thing carried between the two legs is the HTTP-only state cookie.

use axum::http::request::Parts;
use ::oauth2::basic::BasicClient;
use ::oauth2::{AuthUrl, ClientId, CsrfToken, RedirectUrl, Scope};
use rand::{distr::Alphanumeric, Rng};
use std::sync::Arc;
use std::time::Duration;

use super::http;
use super::registry::ProviderRegistry;
use super::types::{OAuthError, UserInfoFetcher};
use crate::auth::UserInfo;
use crate::config::OAuthProviderConfig;
use crate::error::ConfigError;
use crate::request::{self, cookies::Cookie};

/// Name of the state cookie
pub const STATE_COOKIE: &str = "oauth_state";

const STATE_LEN: usize = 24;
const STATE_MAX_AGE_SECS: u64 = 600;

/// Result of a successful OAuth2 request
#[derive(Debug)]
pub enum OAuthOutcome {
    /// Flow started; send the browser to the provider
    Redirect {
        /// Provider authorization URL
        location: String,
        /// State cookie correlating the callback
        state_cookie: Cookie,
    },
    /// Callback completed
    Authenticated(UserInfo),
}

struct ConfiguredProvider {
    name: String,
    client_id: String,
    client_secret: String,
    scope: String,
    redirect_uri: Option<String>,
    auth_url: AuthUrl,
    token_url: String,
    user_info_url: String,
    fetcher: Arc<dyn UserInfoFetcher>,
    http: reqwest::Client,
}

/// Drives the OAuth2 flow for the providers of one login handler
pub struct OAuthManager {
    base_path: String,
    providers: Vec<ConfiguredProvider>,
}

impl std::fmt::Debug for OAuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthManager")
            .field("base_path", &self.base_path)
            .field("providers", &self.provider_names())
            .finish()
    }
}

fn invalid(component: &str, parameter: &str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::InvalidParameter {
        component: component.to_string(),
        parameter: parameter.to_string(),
        reason: reason.to_string(),
    }
}

impl OAuthManager {
    /// Resolve each configured provider against the registry
    ///
    /// # Errors
    ///
    /// Returns an error for unknown providers, malformed endpoint URLs or an
    /// HTTP client that cannot be built.
    pub fn new(
        registry: &ProviderRegistry,
        login_path: &str,
        configs: &[OAuthProviderConfig],
    ) -> Result<Self, ConfigError> {
        let providers = configs
            .iter()
            .map(|config| -> Result<ConfiguredProvider, ConfigError> {
                let provider = registry
                    .get(&config.provider)
                    .ok_or_else(|| ConfigError::UnknownProvider(config.provider.clone()))?;
                let descriptor = &provider.descriptor;
                let name = config.provider.as_str();

                let auth_url = AuthUrl::new(
                    config.auth_url.clone().unwrap_or_else(|| descriptor.auth_url.clone()),
                )
                .map_err(|e| invalid(name, "auth_url", e))?;
                let token_url = config
                    .token_url
                    .clone()
                    .unwrap_or_else(|| descriptor.token_url.clone());
                let user_info_url = config
                    .user_info_url
                    .clone()
                    .unwrap_or_else(|| descriptor.user_info_url.clone());
                url::Url::parse(&token_url).map_err(|e| invalid(name, "token_url", e))?;
                url::Url::parse(&user_info_url).map_err(|e| invalid(name, "user_info_url", e))?;
                if let Some(redirect_uri) = &config.redirect_uri {
                    RedirectUrl::new(redirect_uri.clone())
                        .map_err(|e| invalid(name, "redirect_uri", e))?;
                }

                let http = http::client(Duration::from_secs(config.timeout_secs))
                    .map_err(|e| invalid(name, "timeout", e))?;

                tracing::debug!(provider = name, "oauth2 provider configured");
                Ok(ConfiguredProvider {
                    name: config.provider.clone(),
                    client_id: config.client_id.clone(),
                    client_secret: config.client_secret.clone(),
                    scope: config
                        .scope
                        .clone()
                        .unwrap_or_else(|| descriptor.default_scopes.clone()),
                    redirect_uri: config.redirect_uri.clone(),
                    auth_url,
                    token_url,
                    user_info_url,
                    fetcher: Arc::clone(&provider.fetcher),
                    http,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            base_path: login_path.trim_end_matches('/').to_string(),
            providers,
        })
    }

    /// Configured provider names, in configuration order
    #[must_use]
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name.as_str()).collect()
    }

    /// Whether `path` lies below the login path
    #[must_use]
    pub fn is_flow_path(&self, path: &str) -> bool {
        split_path(&self.base_path, path).is_some()
    }

    /// Handle a request below `{login_path}/{provider}`
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::UnknownProvider`] when the path names no
    /// configured provider; any other error means the login failed.
    pub async fn handle(&self, parts: &Parts) -> Result<OAuthOutcome, OAuthError> {
        let (name, callback_suffix) = split_path(&self.base_path, parts.uri.path())
            .ok_or_else(|| OAuthError::UnknownProvider(parts.uri.path().to_string()))?;
        let provider = self
            .providers
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| OAuthError::UnknownProvider(name.to_string()))?;

        if callback_suffix || is_callback(parts) {
            self.callback(provider, parts).await
        } else {
            self.start(provider, parts)
        }
    }

    /// Cookie that clears the state cookie, for callback requests
    #[must_use]
    pub fn state_cleanup(&self, parts: &Parts) -> Option<Cookie> {
        let (name, callback_suffix) = split_path(&self.base_path, parts.uri.path())?;
        (callback_suffix || is_callback(parts))
            .then(|| Cookie::removal(STATE_COOKIE).with_path(self.flow_path(name)))
    }

    fn flow_path(&self, name: &str) -> String {
        format!("{}/{name}", self.base_path)
    }

    fn redirect_uri(&self, provider: &ConfiguredProvider, parts: &Parts) -> Result<String, OAuthError> {
        if let Some(configured) = &provider.redirect_uri {
            return Ok(configured.clone());
        }
        let host = request::public_host(&parts.headers)
            .ok_or_else(|| OAuthError::RedirectUri("request has no Host header".to_string()))?;
        Ok(format!(
            "{}://{host}{}",
            request::public_scheme(&parts.headers),
            self.flow_path(&provider.name)
        ))
    }

    fn start(&self, provider: &ConfiguredProvider, parts: &Parts) -> Result<OAuthOutcome, OAuthError> {
        let state: String = rand::rng()
            .sample_iter(Alphanumeric)
            .take(STATE_LEN)
            .map(char::from)
            .collect();

        let redirect_uri = RedirectUrl::new(self.redirect_uri(provider, parts)?)
            .map_err(|e| OAuthError::RedirectUri(e.to_string()))?;
        let client = BasicClient::new(ClientId::new(provider.client_id.clone()))
            .set_auth_uri(provider.auth_url.clone())
            .set_redirect_uri(redirect_uri);

        let mut authorize = client.authorize_url(|| CsrfToken::new(state.clone()));
        if !provider.scope.is_empty() {
            authorize = authorize.add_scope(Scope::new(provider.scope.clone()));
        }
        let (location, _) = authorize.url();

        tracing::debug!(provider = %provider.name, "oauth2 flow started");
        let secure = request::public_scheme(&parts.headers) == "https";
        Ok(OAuthOutcome::Redirect {
            location: location.to_string(),
            state_cookie: Cookie::new(STATE_COOKIE, state)
                .with_path(self.flow_path(&provider.name))
                .with_max_age(Some(STATE_MAX_AGE_SECS))
                .secure(secure),
        })
    }

    async fn callback(
        &self,
        provider: &ConfiguredProvider,
        parts: &Parts,
    ) -> Result<OAuthOutcome, OAuthError> {
        if let Some(error) = request::query_param(&parts.uri, "error") {
            let detail = request::query_param(&parts.uri, "error_description")
                .map_or_else(|| error.clone(), |description| format!("{error}: {description}"));
            return Err(OAuthError::Provider(detail));
        }
        let code = request::query_param(&parts.uri, "code").ok_or(OAuthError::MissingCode)?;

        let expected = request::cookies::get(&parts.headers, STATE_COOKIE);
        let received = request::query_param(&parts.uri, "state");
        match (expected, received.as_deref()) {
            (Some(expected), Some(received)) if !expected.is_empty() && expected == received => {}
            (expected, _) => {
                tracing::warn!(
                    provider = %provider.name,
                    cookie_present = expected.is_some(),
                    "oauth2 state mismatch, refusing callback"
                );
                return Err(OAuthError::StateMismatch);
            }
        }

        let redirect_uri = self.redirect_uri(provider, parts)?;
        let access_token = http::exchange_code(
            &provider.http,
            &provider.token_url,
            &[
                ("client_id", provider.client_id.as_str()),
                ("client_secret", provider.client_secret.as_str()),
                ("code", code.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ],
        )
        .await?;

        let (mut user, _raw) = provider
            .fetcher
            .fetch(&provider.http, &provider.user_info_url, &access_token)
            .await?;
        if user.origin.is_empty() {
            user.origin.clone_from(&provider.name);
        }

        tracing::info!(provider = %provider.name, sub = %user.sub, "oauth2 login completed");
        Ok(OAuthOutcome::Authenticated(user))
    }
}

fn is_callback(parts: &Parts) -> bool {
    request::query_param(&parts.uri, "code").is_some()
        || request::query_param(&parts.uri, "error").is_some()
}

/// Split `{base}/{provider}[/callback]` into the provider name and whether
/// the callback suffix is present
fn split_path<'a>(base: &str, path: &'a str) -> Option<(&'a str, bool)> {
    let rest = path.strip_prefix(base)?.strip_prefix('/')?;
    let (name, tail) = rest.split_once('/').unwrap_or((rest, ""));
    if name.is_empty() {
        return None;
    }
    match tail {
        "" => Some((name, false)),
        "callback" => Some((name, true)),
        _ => None,
    }
}
