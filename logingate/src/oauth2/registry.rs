//! Provider registry
//!
//! Built explicitly at startup and handed to every [`OAuthManager`] that
//! needs it; there is no process-global table.
//!
//! [`OAuthManager`]: super::OAuthManager

use std::collections::HashMap;
use std::sync::Arc;

use super::providers::{github, gitlab, google, GitHubFetcher, GitLabFetcher, GoogleFetcher};
use super::types::{Provider, ProviderDescriptor, UserInfoFetcher};

/// Maps provider names to descriptors and user-info fetchers
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Provider>,
}

impl ProviderRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `github`, `google` and `gitlab`
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(github::descriptor(), Arc::new(GitHubFetcher));
        registry.register(google::descriptor(), Arc::new(GoogleFetcher));
        registry.register(gitlab::descriptor(), Arc::new(GitLabFetcher));
        registry
    }

    /// Register a provider under its descriptor name, replacing any previous one
    pub fn register(&mut self, descriptor: ProviderDescriptor, fetcher: Arc<dyn UserInfoFetcher>) {
        self.providers
            .insert(descriptor.name.clone(), Provider { descriptor, fetcher });
    }

    /// Look up a provider
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Provider> {
        self.providers.get(name)
    }

    /// Registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_providers() {
        let registry = ProviderRegistry::with_defaults();
        assert_eq!(registry.names(), vec!["github", "gitlab", "google"]);
        let github = registry.get("github").unwrap();
        assert_eq!(github.descriptor.token_url, "https://github.com/login/oauth/access_token");
        assert!(registry.get("bitbucket").is_none());
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = ProviderRegistry::with_defaults();
        let mut descriptor = github::descriptor();
        descriptor.auth_url = "https://github.example.com/login/oauth/authorize".to_string();
        registry.register(descriptor, Arc::new(GitHubFetcher));

        assert_eq!(
            registry.get("github").unwrap().descriptor.auth_url,
            "https://github.example.com/login/oauth/authorize"
        );
        assert_eq!(registry.names().len(), 3);
    }

    #[test]
    fn test_isolated_registries() {
        let empty = ProviderRegistry::new();
        assert!(empty.names().is_empty());
        assert!(ProviderRegistry::with_defaults().get("google").is_some());
    }
}
