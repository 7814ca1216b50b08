//! Shared HTTP plumbing for OAuth2 providers
//!
//! Token exchange and user-info requests go through clients built here, with
//! redirects disabled and a per-provider timeout.

use reqwest::{
    header::{ACCEPT, USER_AGENT},
    StatusCode,
};
use serde_json::Value;
use std::time::Duration;

use super::types::OAuthError;

const AGENT: &str = concat!("logingate/", env!("CARGO_PKG_VERSION"));

/// Build the client used for one provider
///
/// # Errors
///
/// Returns `reqwest::Error` if the TLS backend cannot be initialised.
pub fn client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(timeout)
        .user_agent(AGENT)
        .build()
}

/// Exchange an authorization code for an access token
///
/// Expects `200` and a JSON body carrying `access_token`. An `error` field in
/// the body fails the exchange even with `200`, as some providers do that.
///
/// # Errors
///
/// Returns an error on transport failure, non-200 status, or a body without
/// an access token.
pub async fn exchange_code(
    client: &reqwest::Client,
    token_url: &str,
    form: &[(&str, &str)],
) -> Result<String, OAuthError> {
    let response = client
        .post(token_url)
        .header(ACCEPT, "application/json")
        .form(form)
        .send()
        .await?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(OAuthError::TokenExchangeFailed(format!(
            "token endpoint answered {status}"
        )));
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| OAuthError::TokenExchangeFailed(format!("malformed token response: {e}")))?;

    if let Some(error) = body.get("error").and_then(Value::as_str) {
        return Err(OAuthError::TokenExchangeFailed(error.to_string()));
    }

    body.get("access_token")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| OAuthError::TokenExchangeFailed("no access_token in response".to_string()))
}

/// GET a JSON document with a bearer token
///
/// # Errors
///
/// Returns an error on transport failure, non-200 status or malformed JSON.
pub async fn fetch_json(
    client: &reqwest::Client,
    url: &str,
    access_token: &str,
) -> Result<Value, OAuthError> {
    let response = client
        .get(url)
        .bearer_auth(access_token)
        .header(ACCEPT, "application/json")
        .header(USER_AGENT, AGENT)
        .send()
        .await?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(OAuthError::UserInfoFailed(format!("{url} answered {status}")));
    }

    response
        .json()
        .await
        .map_err(|e| OAuthError::UserInfoFailed(format!("malformed response from {url}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client() -> reqwest::Client {
        client(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_exchange_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("code=abc"))
            .and(body_string_contains("grant_type=authorization_code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok",
                "token_type": "bearer"
            })))
            .mount(&server)
            .await;

        let token = exchange_code(
            &test_client(),
            &format!("{}/token", server.uri()),
            &[("code", "abc"), ("grant_type", "authorization_code")],
        )
        .await
        .unwrap();
        assert_eq!(token, "tok");
    }

    #[tokio::test]
    async fn test_exchange_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"error": "bad_verification_code"})),
            )
            .mount(&server)
            .await;

        let err = exchange_code(&test_client(), &server.uri(), &[]).await.unwrap_err();
        assert!(matches!(err, OAuthError::TokenExchangeFailed(msg) if msg == "bad_verification_code"));
    }

    #[tokio::test]
    async fn test_exchange_non_ok() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        assert!(exchange_code(&test_client(), &server.uri(), &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_json_sends_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 1})))
            .mount(&server)
            .await;

        let body = fetch_json(&test_client(), &server.uri(), "tok").await.unwrap();
        assert_eq!(body["id"], 1);
    }
}
