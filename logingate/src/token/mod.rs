//! JWT signing and verification
//!
//! Tokens are HMAC-signed with the shared secret from configuration. The
//! payload is a plain claim map, produced from an identity by
//! [`UserInfo::to_claims`](crate::auth::UserInfo::to_claims) and the claims
//! resolver.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::auth::Claims;
use crate::config::JwtSettings;

/// Token errors
#[derive(Debug, Error)]
pub enum TokenError {
    /// Signing failed
    #[error("failed to sign token: {0}")]
    Encode(#[source] jsonwebtoken::errors::Error),

    /// Token is malformed, expired or carries a bad signature
    #[error("invalid token: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),
}

/// Supported HMAC algorithms
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JwtAlgorithm {
    /// HMAC-SHA256
    #[default]
    Hs256,
    /// HMAC-SHA384
    Hs384,
    /// HMAC-SHA512
    Hs512,
}

impl From<JwtAlgorithm> for Algorithm {
    fn from(algorithm: JwtAlgorithm) -> Self {
        match algorithm {
            JwtAlgorithm::Hs256 => Self::HS256,
            JwtAlgorithm::Hs384 => Self::HS384,
            JwtAlgorithm::Hs512 => Self::HS512,
        }
    }
}

/// Signs and verifies login tokens
#[derive(Clone)]
pub struct TokenIssuer {
    algorithm: Algorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry_secs: i64,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("algorithm", &self.algorithm)
            .field("expiry_secs", &self.expiry_secs)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Create an issuer from the JWT settings
    #[must_use]
    pub fn new(settings: &JwtSettings) -> Self {
        let secret = settings.secret.as_bytes();
        Self {
            algorithm: settings.algorithm.into(),
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            expiry_secs: i64::try_from(settings.expiry_secs).unwrap_or(i64::MAX),
        }
    }

    /// Sign a claim set
    ///
    /// When the claims carry no `exp`, one is added at now plus the
    /// configured lifetime.
    ///
    /// # Errors
    ///
    /// Returns an error if the claims cannot be encoded.
    pub fn issue(&self, claims: &Claims) -> Result<String, TokenError> {
        let mut claims = claims.clone();
        if !claims.get("exp").is_some_and(Value::is_number) {
            let exp = Utc::now().timestamp().saturating_add(self.expiry_secs);
            claims.insert("exp".to_string(), Value::from(exp));
        }
        encode(&Header::new(self.algorithm), &claims, &self.encoding).map_err(TokenError::Encode)
    }

    /// Verify a token and return its claims
    ///
    /// # Errors
    ///
    /// Returns an error if the signature, algorithm or expiry is not valid.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_aud = false;
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(TokenError::Invalid)
    }

    /// Re-sign a verified claim set with a fresh expiry and `refs + 1`
    ///
    /// Returns `None` once the token has been refreshed `max_refreshes`
    /// times.
    ///
    /// # Errors
    ///
    /// Returns an error if the claims cannot be encoded.
    pub fn refresh(&self, claims: &Claims, max_refreshes: u32) -> Result<Option<String>, TokenError> {
        let refs = refresh_count(claims);
        if refs >= u64::from(max_refreshes) {
            return Ok(None);
        }
        let mut claims = claims.clone();
        claims.remove("exp");
        claims.insert("refs".to_string(), Value::from(refs + 1));
        self.issue(&claims).map(Some)
    }
}

/// Number of refreshes recorded in a claim set
#[must_use]
pub fn refresh_count(claims: &Claims) -> u64 {
    claims.get("refs").and_then(Value::as_u64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UserInfo;
    use serde_json::json;

    fn settings(secret: &str) -> JwtSettings {
        JwtSettings {
            secret: secret.to_string(),
            ..JwtSettings::default()
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let issuer = TokenIssuer::new(&settings("secret"));
        let token = issuer.issue(&UserInfo::new("bob", "simple").to_claims()).unwrap();
        let claims = issuer.verify(&token).unwrap();

        assert_eq!(claims.get("sub"), Some(&json!("bob")));
        let exp = claims.get("exp").and_then(Value::as_i64).unwrap();
        assert!(exp > Utc::now().timestamp());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = TokenIssuer::new(&settings("one"))
            .issue(&UserInfo::new("bob", "simple").to_claims())
            .unwrap();
        let err = TokenIssuer::new(&settings("two")).verify(&token).unwrap_err();
        assert!(matches!(err, TokenError::Invalid(_)));
    }

    #[test]
    fn test_expired_rejected() {
        let issuer = TokenIssuer::new(&settings("secret"));
        let mut claims = UserInfo::new("bob", "simple").to_claims();
        claims.insert("exp".to_string(), json!(Utc::now().timestamp() - 3600));
        let token = issuer.issue(&claims).unwrap();
        assert!(issuer.verify(&token).is_err());
    }

    #[test]
    fn test_algorithm_mismatch_rejected() {
        let strong = TokenIssuer::new(&JwtSettings {
            algorithm: JwtAlgorithm::Hs512,
            ..settings("secret")
        });
        let token = strong.issue(&UserInfo::new("bob", "simple").to_claims()).unwrap();
        assert!(TokenIssuer::new(&settings("secret")).verify(&token).is_err());
        assert!(strong.verify(&token).is_ok());
    }

    #[test]
    fn test_refresh_counts_up_to_limit() {
        let issuer = TokenIssuer::new(&settings("secret"));
        let mut claims = UserInfo::new("bob", "simple").to_claims();
        claims.insert("role".to_string(), json!("admin"));

        let first = issuer.refresh(&claims, 1).unwrap().unwrap();
        let refreshed = issuer.verify(&first).unwrap();
        assert_eq!(refresh_count(&refreshed), 1);
        assert_eq!(refreshed.get("role"), Some(&json!("admin")));

        assert!(issuer.refresh(&refreshed, 1).unwrap().is_none());
    }

    #[test]
    fn test_algorithm_names() {
        let parsed: JwtAlgorithm = serde_json::from_value(json!("HS384")).unwrap();
        assert_eq!(parsed, JwtAlgorithm::Hs384);
        assert_eq!(Algorithm::from(parsed), Algorithm::HS384);
    }
}
