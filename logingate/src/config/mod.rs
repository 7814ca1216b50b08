//! Configuration management for logingate
//!
//! Configuration is loaded from layered sources with clear precedence:
//!
//! 1. Environment variables (highest priority, `LOGINGATE_` prefix, `__` nesting)
//! 2. The YAML file passed on the command line
//! 3. Hardcoded defaults (fallback)
//!
//! # Example Configuration
//!
//! ```yaml
//! listen:
//!   host: 0.0.0.0
//!   port: 6789
//! health_path: /health
//! login:
//!   path: /login
//!   success_url: /
//!   jwt:
//!     secret: change-me
//!     expiry_secs: 86400
//!   backends:
//!     - provider: simple
//!       options:
//!         bob: secret
//!   oauth:
//!     - provider: github
//!       client_id: abc
//!       client_secret: xyz
//! vhosts:
//!   - name: intranet.example.com
//!     cookie_domain: .example.com
//!     backends:
//!       - provider: htpasswd
//!         options:
//!           file: /etc/logingate/intranet.htpasswd
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use logingate::config::Config;
//! use std::path::Path;
//!
//! # fn example() -> Result<(), logingate::error::ConfigError> {
//! let config = Config::load(Some(Path::new("./logingate.yaml")))?;
//! assert!(config.login.path.starts_with('/'));
//! # Ok(())
//! # }
//! ```

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use rand::{distr::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::claims::ClaimsRule;
use crate::error::ConfigError;
use crate::token::JwtAlgorithm;

/// Listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenSettings {
    /// Bind address
    pub host: String,

    /// Bind port
    pub port: u16,
}

impl Default for ListenSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6789,
        }
    }
}

/// Token signing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtSettings {
    /// Shared HMAC secret; generated at load time when empty
    pub secret: String,

    /// HMAC algorithm
    pub algorithm: JwtAlgorithm,

    /// Token lifetime in seconds
    pub expiry_secs: u64,

    /// How often a token may be refreshed (0 disables refresh)
    pub refreshes: u32,
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            secret: String::new(),
            algorithm: JwtAlgorithm::Hs256,
            expiry_secs: 86400, // 24 hours
            refreshes: 0,
        }
    }
}

/// Session cookie settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieSettings {
    /// Cookie name for the token
    pub name: String,

    /// Cookie domain
    pub domain: Option<String>,

    /// Cookie path
    pub path: String,

    /// HTTP-only cookie (recommended: true)
    pub http_only: bool,

    /// Secure cookie (HTTPS only)
    pub secure: bool,

    /// Max-Age in seconds; a session cookie when unset
    pub expiry_secs: Option<u64>,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            name: "jwt_token".to_string(),
            domain: None,
            path: "/".to_string(),
            http_only: true,
            secure: true,
            expiry_secs: None,
        }
    }
}

/// Post-login redirect settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedirectSettings {
    /// Honour redirect targets at all
    pub enabled: bool,

    /// Query parameter (and cookie name) carrying the target
    pub query_parameter: String,

    /// Require the `Referer` host to equal the request host
    pub check_referer: bool,

    /// Newline-separated list of external hosts that may be redirected to
    pub host_file: Option<PathBuf>,
}

impl Default for RedirectSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            query_parameter: "backTo".to_string(),
            check_referer: true,
            host_file: None,
        }
    }
}

/// Claims resolution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimsSettings {
    /// YAML rule file
    pub file: Option<PathBuf>,

    /// Remote claims endpoint
    pub endpoint: Option<String>,

    /// Bearer token sent to the remote endpoint
    pub endpoint_token: Option<String>,

    /// Timeout for the remote endpoint in seconds
    pub endpoint_timeout_secs: u64,
}

impl Default for ClaimsSettings {
    fn default() -> Self {
        Self {
            file: None,
            endpoint: None,
            endpoint_token: None,
            endpoint_timeout_secs: 5,
        }
    }
}

/// Credential backend declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Registered backend name (`simple`, `htpasswd`, `httpupstream`, ...)
    pub provider: String,

    /// Backend-specific options
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl BackendConfig {
    /// Parse the command-line form `provider:key=value,key=value`
    ///
    /// # Errors
    ///
    /// Returns an error if the provider name or an option is malformed.
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let (provider, options) = split_spec(spec)?;
        Ok(Self {
            provider,
            options: parse_options(options)?,
        })
    }
}

fn default_oauth_timeout() -> u64 {
    30
}

/// OAuth2 provider declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthProviderConfig {
    /// Registered provider name (`github`, `google`, `gitlab`, ...)
    pub provider: String,

    /// OAuth2 client ID
    pub client_id: String,

    /// OAuth2 client secret
    pub client_secret: String,

    /// Scope string; the provider default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Fixed redirect URI; derived from the request when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    /// Authorization endpoint override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_url: Option<String>,

    /// Token endpoint override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,

    /// User-info endpoint override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_info_url: Option<String>,

    /// Timeout for token exchange and user-info calls in seconds
    #[serde(default = "default_oauth_timeout")]
    pub timeout_secs: u64,
}

impl OAuthProviderConfig {
    /// Parse the command-line form `provider:client_id=..,client_secret=..`
    ///
    /// # Errors
    ///
    /// Returns an error if a required option is missing or a value is malformed.
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let (provider, options) = split_spec(spec)?;
        Self::from_options(provider, &parse_options(options)?)
    }

    /// Build a typed provider declaration from a flat option map
    ///
    /// # Errors
    ///
    /// Returns an error if `client_id` or `client_secret` is missing, or if
    /// `timeout` is not a number.
    pub fn from_options(
        provider: String,
        options: &BTreeMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let required = |key: &str| {
            options
                .get(key)
                .cloned()
                .ok_or_else(|| ConfigError::MissingParameter {
                    component: provider.clone(),
                    parameter: key.to_string(),
                })
        };
        let timeout_secs = match options.get("timeout") {
            Some(raw) => raw.parse().map_err(|e| ConfigError::InvalidParameter {
                component: provider.clone(),
                parameter: "timeout".to_string(),
                reason: format!("{e}"),
            })?,
            None => default_oauth_timeout(),
        };

        Ok(Self {
            client_id: required("client_id")?,
            client_secret: required("client_secret")?,
            scope: options.get("scope").cloned(),
            redirect_uri: options.get("redirect_uri").cloned(),
            auth_url: options.get("auth_url").cloned(),
            token_url: options.get("token_url").cloned(),
            user_info_url: options.get("user_info_url").cloned(),
            timeout_secs,
            provider,
        })
    }
}

/// Settings of one login handler
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginSettings {
    /// Path of the login endpoint; providers live below it
    pub path: String,

    /// Where to send the browser after login when no target is usable
    pub success_url: String,

    /// Where to send the browser after logout
    pub logout_url: Option<String>,

    /// Login form template file; the embedded form when unset
    pub template: Option<PathBuf>,

    /// Token signing
    pub jwt: JwtSettings,

    /// Session cookie
    pub cookie: CookieSettings,

    /// Post-login redirects
    pub redirect: RedirectSettings,

    /// Claims resolution
    pub claims: ClaimsSettings,

    /// Credential backends, tried in order
    pub backends: Vec<BackendConfig>,

    /// OAuth2 providers, listed on the form in order
    pub oauth: Vec<OAuthProviderConfig>,

    /// Inline claim rules, evaluated before the rule file
    pub users: Vec<ClaimsRule>,
}

impl Default for LoginSettings {
    fn default() -> Self {
        Self {
            path: "/login".to_string(),
            success_url: "/".to_string(),
            logout_url: None,
            template: None,
            jwt: JwtSettings::default(),
            cookie: CookieSettings::default(),
            redirect: RedirectSettings::default(),
            claims: ClaimsSettings::default(),
            backends: Vec::new(),
            oauth: Vec::new(),
            users: Vec::new(),
        }
    }
}

impl LoginSettings {
    /// Settings for a virtual host: the global settings with the vhost's
    /// own backends, providers and rules plus its overrides
    #[must_use]
    pub fn for_vhost(&self, vhost: &VhostConfig) -> Self {
        let mut settings = self.clone();
        if let Some(domain) = &vhost.cookie_domain {
            settings.cookie.domain = Some(domain.clone());
        }
        if let Some(template) = &vhost.template {
            settings.template = Some(template.clone());
        }
        settings.backends.clone_from(&vhost.backends);
        settings.oauth.clone_from(&vhost.oauth);
        settings.users.clone_from(&vhost.users);
        settings
    }

    fn validate(&self, scope: &str) -> Result<(), ConfigError> {
        if !self.path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "{scope}: login path '{}' must start with '/'",
                self.path
            )));
        }
        if self.claims.file.is_some() && self.claims.endpoint.is_some() {
            return Err(ConfigError::Invalid(format!(
                "{scope}: claims file and claims endpoint are mutually exclusive"
            )));
        }
        Ok(())
    }
}

/// Virtual host declaration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VhostConfig {
    /// Name of the vhost; also the hostname unless `hostname` is set
    pub name: String,

    /// Host header value (without port) selecting this vhost
    pub hostname: Option<String>,

    /// Cookie domain override
    pub cookie_domain: Option<String>,

    /// Template override
    pub template: Option<PathBuf>,

    /// Credential backends of this vhost
    pub backends: Vec<BackendConfig>,

    /// OAuth2 providers of this vhost
    pub oauth: Vec<OAuthProviderConfig>,

    /// Inline claim rules of this vhost
    pub users: Vec<ClaimsRule>,
}

impl VhostConfig {
    /// Hostname this vhost answers for
    #[must_use]
    pub fn hostname(&self) -> &str {
        self.hostname.as_deref().unwrap_or(&self.name)
    }
}

/// Complete logingate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listener
    pub listen: ListenSettings,

    /// Health check path
    pub health_path: String,

    /// Global login settings; also the default handler
    pub login: LoginSettings,

    /// Virtual hosts, matched in order
    pub vhosts: Vec<VhostConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: ListenSettings::default(),
            health_path: "/health".to_string(),
            login: LoginSettings::default(),
            vhosts: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, an optional YAML file and the
    /// environment
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or malformed, or if the
    /// merged configuration fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::load_unvalidated(path)?;
        config.finalize()?;
        Ok(config)
    }

    /// Merge the same sources as [`Config::load`] without calling
    /// [`Config::finalize`], for callers layering their own overrides
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or malformed.
    pub fn load_unvalidated(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::Io {
                    path: path.display().to_string(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                });
            }
            figment = figment.merge(Yaml::file(path));
        }

        figment = figment.merge(Env::prefixed("LOGINGATE_").split("__").lowercase(true));

        Ok(figment.extract()?)
    }

    /// Load configuration from a YAML document on top of the defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed or fails validation.
    pub fn from_yaml(document: &str) -> Result<Self, ConfigError> {
        let figment =
            Figment::from(Serialized::defaults(Self::default())).merge(Yaml::string(document));
        Self::from_figment(&figment)
    }

    fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let mut config: Self = figment.extract()?;
        config.finalize()?;
        Ok(config)
    }

    /// Normalize and validate a configuration assembled in code
    ///
    /// Fills in a random JWT secret when none is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is self-contradictory.
    pub fn finalize(&mut self) -> Result<(), ConfigError> {
        if self.login.path.len() > 1 {
            self.login.path = self.login.path.trim_end_matches('/').to_string();
        }
        self.login.validate("global")?;

        if self.login.jwt.secret.is_empty() {
            tracing::warn!("no jwt secret configured, generating a random one; tokens will not survive a restart");
            self.login.jwt.secret = random_secret();
        }

        let mut seen = HashSet::new();
        for vhost in &self.vhosts {
            if vhost.hostname().is_empty() {
                return Err(ConfigError::Invalid("vhost without name or hostname".to_string()));
            }
            if !seen.insert(vhost.hostname().to_ascii_lowercase()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate vhost hostname '{}'",
                    vhost.hostname()
                )));
            }
            self.login.for_vhost(vhost).validate(&vhost.name)?;
        }
        Ok(())
    }
}

fn random_secret() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

fn split_spec(spec: &str) -> Result<(String, &str), ConfigError> {
    let (provider, options) = spec.split_once(':').unwrap_or((spec, ""));
    let provider = provider.trim();
    if provider.is_empty() {
        return Err(ConfigError::Invalid(format!("missing provider name in '{spec}'")));
    }
    Ok((provider.to_string(), options))
}

/// Parse `key=value,key=value` into an option map
///
/// Empty segments are skipped; whitespace around keys and values is trimmed.
///
/// # Errors
///
/// Returns an error if a segment has no `=` or an empty key.
pub fn parse_options(raw: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let mut options = BTreeMap::new();
    for segment in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (key, value) = segment.split_once('=').ok_or_else(|| {
            ConfigError::Invalid(format!("option '{segment}' is not of the form key=value"))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(ConfigError::Invalid(format!("option '{segment}' has an empty key")));
        }
        options.insert(key.to_string(), value.trim().to_string());
    }
    Ok(options)
}
