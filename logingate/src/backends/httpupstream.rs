//! HTTP basic-auth upstream backend
//!
//! Credentials are forwarded as basic auth on a GET to the upstream URL.
//! `200` accepts, `401`/`403` reject, any other status is an error.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use url::Url;

use super::{Backend, BackendError, BackendOptions};
use crate::auth::UserInfo;
use crate::error::ConfigError;

/// Registry name
pub const NAME: &str = "httpupstream";

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Backend delegating to an HTTP endpoint protected by basic auth
#[derive(Debug, Clone)]
pub struct HttpUpstreamBackend {
    upstream: Url,
    client: reqwest::Client,
}

fn invalid(parameter: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidParameter {
        component: NAME.to_string(),
        parameter: parameter.to_string(),
        reason: reason.to_string(),
    }
}

impl HttpUpstreamBackend {
    /// Options: `upstream` (required), `skipverify`, `timeout` in seconds
    ///
    /// # Errors
    ///
    /// Returns an error if `upstream` is missing or any option is malformed.
    pub fn from_options(options: &BackendOptions) -> Result<Self, ConfigError> {
        let upstream = options.get("upstream").ok_or_else(|| ConfigError::MissingParameter {
            component: NAME.to_string(),
            parameter: "upstream".to_string(),
        })?;
        let upstream = Url::parse(upstream).map_err(|e| invalid("upstream", e))?;

        let skip_verify = options
            .get("skipverify")
            .map(|raw| raw.parse::<bool>())
            .transpose()
            .map_err(|e| invalid("skipverify", e))?
            .unwrap_or(false);

        let timeout = options
            .get("timeout")
            .map(|raw| raw.parse::<u64>())
            .transpose()
            .map_err(|e| invalid("timeout", e))?
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        if skip_verify {
            tracing::warn!(upstream = %upstream, "TLS verification disabled for upstream backend");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .danger_accept_invalid_certs(skip_verify)
            .build()
            .map_err(|e| invalid("upstream", e))?;

        Ok(Self { upstream, client })
    }
}

#[async_trait]
impl Backend for HttpUpstreamBackend {
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserInfo>, BackendError> {
        let response = self
            .client
            .get(self.upstream.clone())
            .basic_auth(username, Some(password))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(Some(UserInfo::new(username, NAME))),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            status => Err(BackendError::Status(status.as_u16())),
        }
    }

    fn name(&self) -> &'static str {
        NAME
    }
}
