//! Credential backends
//!
//! A backend verifies a username/password pair and, on success, produces a
//! [`UserInfo`]. Wrong credentials are `Ok(None)`; only upstream or I/O
//! failures are errors.
//!
//! Backends are constructed from configuration through a [`BackendRegistry`],
//! which maps a provider name to a factory. The default registry knows
//! `simple`, `htpasswd` and `httpupstream`; embedders may register their own.
//!
//! # Example
//!
//! ```rust
//! use logingate::backends::{authenticate_chain, BackendRegistry};
//! use logingate::config::BackendConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = BackendRegistry::with_defaults();
//! let chain = registry.build_all(&[BackendConfig::parse("simple:bob=secret")?])?;
//!
//! let user = authenticate_chain(&chain, "bob", "secret").await?;
//! assert_eq!(user.map(|u| u.sub).as_deref(), Some("bob"));
//! # Ok(())
//! # }
//! ```

pub mod htpasswd;
pub mod httpupstream;
pub mod simple;

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;

use crate::auth::UserInfo;
use crate::config::BackendConfig;
use crate::error::ConfigError;

pub use htpasswd::HtpasswdBackend;
pub use httpupstream::HttpUpstreamBackend;
pub use simple::SimpleBackend;

/// Backend errors
#[derive(Debug, Error)]
pub enum BackendError {
    /// Request to an upstream service failed
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    /// Upstream answered with an unexpected status
    #[error("upstream answered with status {0}")]
    Status(u16),

    /// Credential file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path of the file
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Password verifier
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Backend: Send + Sync {
    /// Verify a username/password pair
    ///
    /// # Errors
    ///
    /// Returns an error only when verification itself failed; wrong
    /// credentials are `Ok(None)`.
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserInfo>, BackendError>;

    /// Name of the backend implementation
    fn name(&self) -> &'static str;
}

/// Backend options as given in configuration
pub type BackendOptions = BTreeMap<String, String>;

/// Constructor for a backend from its options
pub type BackendFactory =
    Arc<dyn Fn(&BackendOptions) -> Result<Arc<dyn Backend>, ConfigError> + Send + Sync>;

/// Maps backend names to factories
#[derive(Clone, Default)]
pub struct BackendRegistry {
    factories: HashMap<String, BackendFactory>,
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.names())
            .finish()
    }
}

impl BackendRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in backends
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(simple::NAME, |options| {
            Ok(Arc::new(SimpleBackend::from_options(options)?) as Arc<dyn Backend>)
        });
        registry.register(htpasswd::NAME, |options| {
            Ok(Arc::new(HtpasswdBackend::from_options(options)?) as Arc<dyn Backend>)
        });
        registry.register(httpupstream::NAME, |options| {
            Ok(Arc::new(HttpUpstreamBackend::from_options(options)?) as Arc<dyn Backend>)
        });
        registry
    }

    /// Register a factory under `name`, replacing any previous one
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&BackendOptions) -> Result<Arc<dyn Backend>, ConfigError> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Whether a factory is registered under `name`
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Construct one backend
    ///
    /// # Errors
    ///
    /// Returns an error if the name is unknown or the options are invalid.
    pub fn build(&self, config: &BackendConfig) -> Result<Arc<dyn Backend>, ConfigError> {
        let factory = self
            .factories
            .get(&config.provider)
            .ok_or_else(|| ConfigError::UnknownBackend(config.provider.clone()))?;
        let backend = factory(&config.options)?;
        tracing::debug!(backend = backend.name(), "backend configured");
        Ok(backend)
    }

    /// Construct a backend chain, preserving order
    ///
    /// # Errors
    ///
    /// Returns the first configuration error encountered.
    pub fn build_all(&self, configs: &[BackendConfig]) -> Result<Vec<Arc<dyn Backend>>, ConfigError> {
        configs.iter().map(|config| self.build(config)).collect()
    }
}

/// Try each backend in order
///
/// The first backend that accepts the credentials wins and later backends
/// are not consulted. The first backend that fails aborts the attempt: an
/// error never falls through to the next backend.
///
/// # Errors
///
/// Returns the error of the first failing backend.
pub async fn authenticate_chain(
    backends: &[Arc<dyn Backend>],
    username: &str,
    password: &str,
) -> Result<Option<UserInfo>, BackendError> {
    for backend in backends {
        if let Some(user) = backend.authenticate(username, password).await? {
            return Ok(Some(user));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepting(origin: &'static str) -> Arc<dyn Backend> {
        let mut mock = MockBackend::new();
        mock.expect_authenticate()
            .times(1)
            .returning(move |user, _| Ok(Some(UserInfo::new(user, origin))));
        Arc::new(mock)
    }

    fn rejecting() -> Arc<dyn Backend> {
        let mut mock = MockBackend::new();
        mock.expect_authenticate().times(1).returning(|_, _| Ok(None));
        Arc::new(mock)
    }

    fn failing() -> Arc<dyn Backend> {
        let mut mock = MockBackend::new();
        mock.expect_authenticate()
            .times(1)
            .returning(|_, _| Err(BackendError::Status(503)));
        Arc::new(mock)
    }

    fn untouched() -> Arc<dyn Backend> {
        let mut mock = MockBackend::new();
        mock.expect_authenticate().never();
        Arc::new(mock)
    }

    #[tokio::test]
    async fn test_first_success_short_circuits() {
        let chain = vec![rejecting(), accepting("second"), untouched()];
        let user = authenticate_chain(&chain, "bob", "secret").await.unwrap().unwrap();
        assert_eq!(user, UserInfo::new("bob", "second"));
    }

    #[tokio::test]
    async fn test_first_error_aborts() {
        let chain = vec![rejecting(), failing(), untouched()];
        let err = authenticate_chain(&chain, "bob", "secret").await.unwrap_err();
        assert!(matches!(err, BackendError::Status(503)));
    }

    #[tokio::test]
    async fn test_error_wins_over_later_success() {
        let chain = vec![failing(), untouched()];
        assert!(authenticate_chain(&chain, "bob", "secret").await.is_err());
    }

    #[tokio::test]
    async fn test_all_reject() {
        let chain = vec![rejecting(), rejecting()];
        assert!(authenticate_chain(&chain, "bob", "wrong").await.unwrap().is_none());
        assert!(authenticate_chain(&[], "bob", "wrong").await.unwrap().is_none());
    }

    #[test]
    fn test_default_registry() {
        let registry = BackendRegistry::with_defaults();
        assert_eq!(registry.names(), vec!["htpasswd", "httpupstream", "simple"]);
    }

    #[test]
    fn test_unknown_backend() {
        let registry = BackendRegistry::with_defaults();
        let err = registry
            .build(&BackendConfig::parse("osiam:endpoint=http://x").unwrap())
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::UnknownBackend(name) if name == "osiam"));
    }

    #[test]
    fn test_custom_factory() {
        let mut registry = BackendRegistry::new();
        registry.register("static", |options| {
            Ok(Arc::new(SimpleBackend::from_options(options)?) as Arc<dyn Backend>)
        });
        assert!(registry.contains("static"));
        assert!(!registry.contains("simple"));
        assert!(registry.build(&BackendConfig::parse("static:bob=secret").unwrap()).is_ok());
    }
}
