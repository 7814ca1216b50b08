//! Authenticated identity
//!
//! [`UserInfo`] is what every backend and OAuth2 provider produces. It is not
//! the token payload: [`UserInfo::to_claims`] is the explicit step that turns an
//! identity into the claim map that gets signed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Claim set embedded in an issued token
pub type Claims = Map<String, Value>;

/// Backend-agnostic identity of an authenticated user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    /// Subject (user id)
    pub sub: String,

    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Email address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Avatar URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,

    /// Backend or provider that authenticated this identity
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub origin: String,

    /// Hosted-domain hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// Group memberships, in provider order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,

    /// Expiry as unix seconds
    #[serde(default, rename = "exp", skip_serializing_if = "Option::is_none")]
    pub expiry: Option<i64>,

    /// Number of times the token carrying this identity has been refreshed
    #[serde(default, rename = "refs", skip_serializing_if = "is_zero")]
    pub refreshes: u32,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl UserInfo {
    /// Create an identity with only a subject and origin
    pub fn new(sub: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            sub: sub.into(),
            origin: origin.into(),
            ..Self::default()
        }
    }

    /// Flatten the identity into a claim map
    ///
    /// Unset optional fields are omitted rather than written as `null`.
    #[must_use]
    pub fn to_claims(&self) -> Claims {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => {
                let mut map = Claims::new();
                map.insert("sub".to_string(), Value::String(self.sub.clone()));
                map
            }
        }
    }

    /// Recover an identity from a verified claim map
    ///
    /// Unknown claims are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if a known claim has the wrong JSON type.
    pub fn from_claims(claims: &Claims) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(claims.clone()))
    }
}

/// Merge `overrides` onto `base`; keys in `overrides` win
#[must_use]
pub fn merge_claims(mut base: Claims, overrides: &Claims) -> Claims {
    for (key, value) in overrides {
        base.insert(key.clone(), value.clone());
    }
    base
}
