//! Static user/password map

use async_trait::async_trait;

use super::{Backend, BackendError, BackendOptions};
use crate::auth::UserInfo;
use crate::error::ConfigError;

/// Registry name
pub const NAME: &str = "simple";

/// Backend holding `user=password` pairs from configuration
#[derive(Debug, Clone)]
pub struct SimpleBackend {
    users: BackendOptions,
}

impl SimpleBackend {
    /// Every option is a `user=password` pair
    ///
    /// # Errors
    ///
    /// Returns an error if no user is configured.
    pub fn from_options(options: &BackendOptions) -> Result<Self, ConfigError> {
        if options.is_empty() {
            return Err(ConfigError::MissingParameter {
                component: NAME.to_string(),
                parameter: "<user>=<password>".to_string(),
            });
        }
        Ok(Self {
            users: options.clone(),
        })
    }
}

#[async_trait]
impl Backend for SimpleBackend {
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserInfo>, BackendError> {
        Ok(self
            .users
            .get(username)
            .filter(|expected| expected.as_str() == password)
            .map(|_| UserInfo::new(username, NAME)))
    }

    fn name(&self) -> &'static str {
        NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_options;

    #[tokio::test]
    async fn test_simple_backend() {
        let backend = SimpleBackend::from_options(&parse_options("bob=secret,alice=pw").unwrap()).unwrap();

        let user = backend.authenticate("bob", "secret").await.unwrap().unwrap();
        assert_eq!(user.sub, "bob");
        assert_eq!(user.origin, "simple");

        assert!(backend.authenticate("bob", "pw").await.unwrap().is_none());
        assert!(backend.authenticate("carol", "secret").await.unwrap().is_none());
    }

    #[test]
    fn test_requires_users() {
        assert!(SimpleBackend::from_options(&BackendOptions::new()).is_err());
    }
}
