//! Virtual host resolution
//!
//! Each configured vhost gets its own [`LoginHandler`], built from the global
//! login settings overlaid with the vhost's backends, providers, rules and
//! overrides. Requests are matched on the `Host` header without its port;
//! the first vhost whose hostname matches wins, anything else goes to the
//! default handler.

use axum::http::HeaderMap;
use std::sync::Arc;

use crate::backends::BackendRegistry;
use crate::config::Config;
use crate::error::ConfigError;
use crate::handler::LoginHandler;
use crate::oauth2::ProviderRegistry;
use crate::request;

/// Selects the login handler for a request
#[derive(Debug)]
pub struct VhostRouter {
    vhosts: Vec<(String, Arc<LoginHandler>)>,
    default: Arc<LoginHandler>,
}

impl VhostRouter {
    /// Build the default handler and one handler per vhost
    ///
    /// # Errors
    ///
    /// Returns the first configuration error of any handler.
    pub fn new(
        config: &Config,
        backends: &BackendRegistry,
        providers: &ProviderRegistry,
    ) -> Result<Self, ConfigError> {
        let default = Arc::new(LoginHandler::new(config.login.clone(), backends, providers)?);

        let vhosts = config
            .vhosts
            .iter()
            .map(|vhost| -> Result<(String, Arc<LoginHandler>), ConfigError> {
                let handler =
                    LoginHandler::new(config.login.for_vhost(vhost), backends, providers)?;
                tracing::info!(
                    vhost = %vhost.name,
                    hostname = vhost.hostname(),
                    backends = ?handler.backend_names(),
                    "vhost configured"
                );
                Ok((vhost.hostname().to_ascii_lowercase(), Arc::new(handler)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { vhosts, default })
    }

    /// Handler for the request's host
    #[must_use]
    pub fn select(&self, headers: &HeaderMap) -> &Arc<LoginHandler> {
        let Some(host) = request::host(headers).map(request::strip_port) else {
            return &self.default;
        };
        self.vhosts
            .iter()
            .find(|(hostname, _)| hostname.eq_ignore_ascii_case(host))
            .map_or(&self.default, |(_, handler)| handler)
    }

    /// The handler serving unmatched hosts
    #[must_use]
    pub const fn default_handler(&self) -> &Arc<LoginHandler> {
        &self.default
    }

    /// Number of configured vhosts
    #[must_use]
    pub fn len(&self) -> usize {
        self.vhosts.len()
    }

    /// Whether only the default handler exists
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vhosts.is_empty()
    }
}
