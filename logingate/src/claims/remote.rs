//! Remote claims endpoint
//!
//! The identity is sent as query parameters (`sub`, `origin`, `domain`,
//! `email`, one `group` per group) on an authenticated GET. The JSON object
//! answered is merged onto the identity's own fields.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use super::{ClaimsError, ClaimsProvider};
use crate::auth::{merge_claims, Claims, UserInfo};
use crate::error::ConfigError;

/// Claims fetched from an HTTP endpoint
#[derive(Debug, Clone)]
pub struct RemoteClaims {
    endpoint: Url,
    token: Option<String>,
    client: reqwest::Client,
}

impl RemoteClaims {
    /// Claims source querying `endpoint`, authenticated with a bearer token
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint URL is malformed.
    pub fn new(endpoint: &str, token: Option<String>, timeout: Duration) -> Result<Self, ConfigError> {
        let invalid = |parameter: &str, reason: String| ConfigError::InvalidParameter {
            component: "claims".to_string(),
            parameter: parameter.to_string(),
            reason,
        };
        let endpoint = Url::parse(endpoint).map_err(|e| invalid("endpoint", e.to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| invalid("endpoint_timeout_secs", e.to_string()))?;
        Ok(Self {
            endpoint,
            token,
            client,
        })
    }

    fn query(user: &UserInfo) -> Vec<(&'static str, &str)> {
        let mut query = vec![("sub", user.sub.as_str()), ("origin", user.origin.as_str())];
        if let Some(domain) = &user.domain {
            query.push(("domain", domain.as_str()));
        }
        if let Some(email) = &user.email {
            query.push(("email", email.as_str()));
        }
        query.extend(user.groups.iter().map(|group| ("group", group.as_str())));
        query
    }
}

#[async_trait]
impl ClaimsProvider for RemoteClaims {
    async fn claims(&self, user: &UserInfo) -> Result<Claims, ClaimsError> {
        let mut request = self
            .client
            .get(self.endpoint.clone())
            .query(&Self::query(user));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(ClaimsError::Status(status.as_u16()));
        }

        match response.json::<Value>().await {
            Ok(Value::Object(remote)) => Ok(merge_claims(user.to_claims(), &remote)),
            Ok(other) => Err(ClaimsError::Malformed(format!("expected an object, got {other}"))),
            Err(e) => Err(ClaimsError::Malformed(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn remote(server: &MockServer) -> RemoteClaims {
        RemoteClaims::new(
            &format!("{}/claims", server.uri()),
            Some("service-token".to_string()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_remote_claims_merge() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/claims"))
            .and(header("authorization", "Bearer service-token"))
            .and(query_param("sub", "bob"))
            .and(query_param("origin", "simple"))
            .and(query_param("group", "ops"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "role": "admin",
                "origin": "directory"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut user = UserInfo::new("bob", "simple");
        user.groups = vec!["ops".to_string()];
        let claims = remote(&server).claims(&user).await.unwrap();

        assert_eq!(claims.get("sub"), Some(&json!("bob")));
        assert_eq!(claims.get("role"), Some(&json!("admin")));
        assert_eq!(claims.get("origin"), Some(&json!("directory")));
    }

    #[tokio::test]
    async fn test_non_ok_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = remote(&server)
            .claims(&UserInfo::new("bob", "simple"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClaimsError::Status(404)));
    }

    #[tokio::test]
    async fn test_non_object_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["role"])))
            .mount(&server)
            .await;

        let err = remote(&server)
            .claims(&UserInfo::new("bob", "simple"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClaimsError::Malformed(_)));
    }

    #[test]
    fn test_query_parameters() {
        let mut user = UserInfo::new("bob", "google");
        user.email = Some("bob@example.com".to_string());
        user.groups = vec!["a".to_string(), "b".to_string()];
        let query = RemoteClaims::query(&user);
        assert_eq!(
            query,
            vec![
                ("sub", "bob"),
                ("origin", "google"),
                ("email", "bob@example.com"),
                ("group", "a"),
                ("group", "b"),
            ]
        );
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(RemoteClaims::new("::", None, Duration::from_secs(1)).is_err());
    }
}
