//! Shared helpers for the integration tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use logingate::{
    config::{Config, JwtSettings},
    gateway::Gateway,
    token::TokenIssuer,
};
use tower::ServiceExt;

pub const SECRET: &str = "integration-secret";

/// Global login settings with one simple backend (`bob` / `secret`)
pub fn base_yaml() -> String {
    format!(
        r"
login:
  jwt:
    secret: {SECRET}
  backends:
    - provider: simple
      options:
        bob: secret
"
    )
}

/// Router for a YAML document
pub fn router(yaml: &str) -> Router {
    let config = Config::from_yaml(yaml).unwrap();
    Gateway::from_config(&config).unwrap().into_router()
}

/// Issuer sharing the test secret
pub fn issuer() -> TokenIssuer {
    TokenIssuer::new(&JwtSettings {
        secret: SECRET.to_string(),
        ..JwtSettings::default()
    })
}

/// Send one request through a fresh clone of the router
pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn location(response: &Response<Body>) -> &str {
    response.headers().get(header::LOCATION).unwrap().to_str().unwrap()
}

/// All `Set-Cookie` values of a response
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

/// Value of the cookie `name` among the `Set-Cookie` headers
pub fn cookie_value(response: &Response<Body>, name: &str) -> Option<String> {
    set_cookies(response).into_iter().find_map(|cookie| {
        let pair = cookie.split(';').next()?;
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// HTML form login for `bob`
pub fn form_login(host: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::post("/login")
        .header(header::HOST, host)
        .header(header::ACCEPT, "text/html")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from("username=bob&password=secret")).unwrap()
}
