//! Rule-based claims
//!
//! ```yaml
//! - sub: bob
//!   origin: htpasswd
//!   claims:
//!     role: admin
//! - domain: example.com
//!   groups: [ops, sre]
//!   claims:
//!     role: operator
//! ```
//!
//! A rule matches when every predicate it sets equals the identity's field;
//! `groups` matches when any listed group is one of the identity's groups.
//! The first matching rule wins.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ClaimsError, ClaimsProvider};
use crate::auth::{merge_claims, Claims, UserInfo};

/// One match rule with its claim overrides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimsRule {
    /// Subject to match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Origin to match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,

    /// Email to match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Domain to match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// Groups, any of which must be held
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,

    /// Claims merged onto the identity when the rule matches
    pub claims: Claims,
}

fn field_matches(predicate: Option<&str>, value: Option<&str>) -> bool {
    match predicate.filter(|p| !p.is_empty()) {
        Some(expected) => value == Some(expected),
        None => true,
    }
}

impl ClaimsRule {
    /// Whether this rule applies to `user`
    #[must_use]
    pub fn matches(&self, user: &UserInfo) -> bool {
        let origin = Some(user.origin.as_str()).filter(|o| !o.is_empty());
        field_matches(self.sub.as_deref(), Some(user.sub.as_str()))
            && field_matches(self.origin.as_deref(), origin)
            && field_matches(self.email.as_deref(), user.email.as_deref())
            && field_matches(self.domain.as_deref(), user.domain.as_deref())
            && (self.groups.is_empty() || self.groups.iter().any(|g| user.groups.contains(g)))
    }
}

/// Parse a YAML rule list
///
/// # Errors
///
/// Returns an error if the document is not a list of rules.
pub fn parse(document: &str) -> Result<Vec<ClaimsRule>, serde_yml::Error> {
    if document.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_yml::from_str(document)
}

/// Claims from an ordered rule list
#[derive(Debug, Clone, Default)]
pub struct RuleClaims {
    rules: Vec<ClaimsRule>,
}

impl RuleClaims {
    /// Rules are evaluated in the given order
    #[must_use]
    pub const fn new(rules: Vec<ClaimsRule>) -> Self {
        Self { rules }
    }

    /// First rule matching `user`
    #[must_use]
    pub fn find(&self, user: &UserInfo) -> Option<&ClaimsRule> {
        self.rules.iter().find(|rule| rule.matches(user))
    }
}

#[async_trait]
impl ClaimsProvider for RuleClaims {
    async fn claims(&self, user: &UserInfo) -> Result<Claims, ClaimsError> {
        let base = user.to_claims();
        Ok(match self.find(user) {
            Some(rule) => merge_claims(base, &rule.claims),
            None => base,
        })
    }
}
