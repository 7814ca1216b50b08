//! HTTP surface
//!
//! Assembles the axum router: the health route on every host, and every
//! other request dispatched to the login handler selected by the vhost
//! router.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::backends::BackendRegistry;
use crate::config::Config;
use crate::error::ConfigError;
use crate::health::health;
use crate::oauth2::ProviderRegistry;
use crate::vhost::VhostRouter;

/// A configured login gateway
#[derive(Debug, Clone)]
pub struct Gateway {
    vhosts: Arc<VhostRouter>,
    health_path: String,
}

impl Gateway {
    /// Gateway with the built-in backends and providers
    ///
    /// # Errors
    ///
    /// Returns the first configuration error of any login handler.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Self::with_registries(
            config,
            &BackendRegistry::with_defaults(),
            &ProviderRegistry::with_defaults(),
        )
    }

    /// Gateway resolving names against explicit registries
    ///
    /// # Errors
    ///
    /// Returns the first configuration error of any login handler.
    pub fn with_registries(
        config: &Config,
        backends: &BackendRegistry,
        providers: &ProviderRegistry,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            vhosts: Arc::new(VhostRouter::new(config, backends, providers)?),
            health_path: config.health_path.clone(),
        })
    }

    /// The vhost router
    #[must_use]
    pub fn vhosts(&self) -> &VhostRouter {
        &self.vhosts
    }

    /// Build the axum router
    pub fn into_router(self) -> Router {
        Router::new()
            .route(&self.health_path, get(health))
            .fallback(dispatch)
            .layer(TraceLayer::new_for_http())
            .with_state(self.vhosts)
    }
}

async fn dispatch(State(vhosts): State<Arc<VhostRouter>>, request: Request<Body>) -> Response {
    let handler = Arc::clone(vhosts.select(request.headers()));
    handler.handle(request).await
}
