//! Claims resolution
//!
//! After authentication the identity is turned into the claim set that gets
//! signed. Two sources exist behind [`ClaimsProvider`]: ordered match rules
//! (inline in the configuration and/or a YAML file) and a remote endpoint.
//! In both, the identity's own fields are the base and the source's claims
//! win on key collision.

pub mod remote;
pub mod rules;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::auth::{Claims, UserInfo};
use crate::config::ClaimsSettings;
use crate::error::ConfigError;

pub use remote::RemoteClaims;
pub use rules::{ClaimsRule, RuleClaims};

/// Claims resolution errors
#[derive(Debug, Error)]
pub enum ClaimsError {
    /// Claims endpoint answered with a non-200 status
    #[error("claims endpoint answered with status {0}")]
    Status(u16),

    /// Claims endpoint could not be reached
    #[error("claims request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Claims endpoint answered with something other than a JSON object
    #[error("malformed claims response: {0}")]
    Malformed(String),
}

/// Computes the claim set for an authenticated identity
#[async_trait]
pub trait ClaimsProvider: Send + Sync {
    /// Claims to sign for `user`
    ///
    /// # Errors
    ///
    /// Returns an error if the claim source failed; the login must then fail.
    async fn claims(&self, user: &UserInfo) -> Result<Claims, ClaimsError>;
}

/// Build the claims source for one login handler
///
/// A remote endpoint takes the place of rules. Otherwise inline rules are
/// evaluated before the rules of the file.
///
/// # Errors
///
/// Returns an error if the rule file cannot be read or parsed, or the
/// endpoint URL is malformed.
pub fn from_settings(
    settings: &ClaimsSettings,
    inline: &[ClaimsRule],
) -> Result<Arc<dyn ClaimsProvider>, ConfigError> {
    if let Some(endpoint) = &settings.endpoint {
        return Ok(Arc::new(RemoteClaims::new(
            endpoint,
            settings.endpoint_token.clone(),
            Duration::from_secs(settings.endpoint_timeout_secs),
        )?));
    }

    let mut rules = inline.to_vec();
    if let Some(file) = settings.file.as_deref() {
        rules.extend(load_rule_file(file)?);
    }
    Ok(Arc::new(RuleClaims::new(rules)))
}

fn load_rule_file(path: &Path) -> Result<Vec<ClaimsRule>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let rules = rules::parse(&content).map_err(|e| ConfigError::InvalidParameter {
        component: "claims".to_string(),
        parameter: "file".to_string(),
        reason: e.to_string(),
    })?;
    tracing::debug!(file = %path.display(), rules = rules.len(), "claims rules loaded");
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[tokio::test]
    async fn test_inline_rules_before_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "- sub: bob\n  claims:\n    role: file").unwrap();
        file.flush().unwrap();

        let inline: Vec<ClaimsRule> =
            rules::parse("- sub: bob\n  claims:\n    role: inline").unwrap();
        let settings = ClaimsSettings {
            file: Some(file.path().to_path_buf()),
            ..ClaimsSettings::default()
        };

        let provider = from_settings(&settings, &inline).unwrap();
        let claims = provider.claims(&UserInfo::new("bob", "simple")).await.unwrap();
        assert_eq!(claims.get("role"), Some(&json!("inline")));
    }

    #[tokio::test]
    async fn test_no_source_yields_identity() {
        let provider = from_settings(&ClaimsSettings::default(), &[]).unwrap();
        let user = UserInfo::new("alice", "simple");
        assert_eq!(provider.claims(&user).await.unwrap(), user.to_claims());
    }

    #[test]
    fn test_missing_rule_file() {
        let settings = ClaimsSettings {
            file: Some("/nonexistent/users.yml".into()),
            ..ClaimsSettings::default()
        };
        assert!(matches!(
            from_settings(&settings, &[]),
            Err(ConfigError::Io { .. })
        ));
    }
}
