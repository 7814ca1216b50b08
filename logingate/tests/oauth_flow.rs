//! OAuth2 three-legged flow against a mocked provider

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::{body_text, cookie_value, issuer, location, router, send, set_cookies, SECRET};
use serde_json::json;
use url::Url;
use wiremock::{
    matchers::{body_string_contains, header as header_is, method, path},
    Mock, MockServer, ResponseTemplate,
};

const HOST: &str = "login.example.com";

fn yaml(server: &MockServer) -> String {
    let uri = server.uri();
    format!(
        r"
login:
  jwt:
    secret: {SECRET}
  oauth:
    - provider: github
      client_id: client-1
      client_secret: shh
      auth_url: {uri}/authorize
      token_url: {uri}/token
      user_info_url: {uri}/user
"
    )
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri).header(header::HOST, HOST);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_start_redirects_with_state() {
    let server = MockServer::start().await;
    let app = router(&yaml(&server));

    let response = send(&app, get("/login/github", None)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let target = Url::parse(location(&response)).unwrap();
    assert!(target.as_str().starts_with(&format!("{}/authorize?", server.uri())));

    let param = |name: &str| {
        target
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    };
    assert_eq!(param("client_id").as_deref(), Some("client-1"));
    assert_eq!(
        param("redirect_uri").as_deref(),
        Some("http://login.example.com/login/github")
    );

    let state = param("state").unwrap();
    assert_eq!(cookie_value(&response, "oauth_state"), Some(state));
}

#[tokio::test]
async fn test_callback_issues_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("code=the-code"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "tok", "token_type": "bearer"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .and(header_is("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "login": "octocat",
            "name": "The Octocat",
            "avatar_url": "https://avatars.example.com/octocat"
        })))
        .mount(&server)
        .await;
    let app = router(&yaml(&server));

    let response = send(
        &app,
        get("/login/github?code=the-code&state=s1", Some("oauth_state=s1")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookies(&response)
        .iter()
        .any(|cookie| cookie.starts_with("oauth_state=;") && cookie.contains("Max-Age=0")));
    let claims = issuer().verify(&body_text(response).await).unwrap();
    assert_eq!(claims.get("sub"), Some(&json!("octocat")));
    assert_eq!(claims.get("origin"), Some(&json!("github")));
    assert_eq!(claims.get("name"), Some(&json!("The Octocat")));
}

#[tokio::test]
async fn test_state_mismatch_skips_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok"})))
        .expect(0)
        .mount(&server)
        .await;
    let app = router(&yaml(&server));

    let mismatch = send(
        &app,
        get("/login/github?code=c&state=forged", Some("oauth_state=real")),
    )
    .await;
    assert_eq!(mismatch.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(cookie_value(&mismatch, "jwt_token").is_none());

    let missing = send(&app, get("/login/github?code=c&state=forged", None)).await;
    assert_eq!(missing.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_provider_error_and_unknown_provider() {
    let server = MockServer::start().await;
    let app = router(&yaml(&server));

    let denied = send(&app, get("/login/github?error=access_denied", None)).await;
    assert_eq!(denied.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let unknown = send(&app, get("/login/bitbucket", None)).await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_redirect_target_survives_flow() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"login": "octocat"})))
        .mount(&server)
        .await;
    let app = router(&yaml(&server));

    let start = Request::get("/login/github?backTo=%2Fapp")
        .header(header::HOST, HOST)
        .header(header::REFERER, "http://login.example.com/start")
        .body(Body::empty())
        .unwrap();
    let start = send(&app, start).await;
    assert_eq!(start.status(), StatusCode::SEE_OTHER);
    let parked = cookie_value(&start, "backTo").unwrap();
    let state = cookie_value(&start, "oauth_state").unwrap();

    let callback = Request::get(format!("/login/github?code=c&state={state}"))
        .header(header::HOST, HOST)
        .header(header::ACCEPT, "text/html")
        .header(header::COOKIE, format!("oauth_state={state}; backTo={parked}"))
        .body(Body::empty())
        .unwrap();
    let callback = send(&app, callback).await;

    assert_eq!(callback.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&callback), "/app");
    assert!(cookie_value(&callback, "jwt_token").is_some_and(|token| !token.is_empty()));
}
