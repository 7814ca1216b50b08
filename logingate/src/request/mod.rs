//! Request inspection helpers shared by the handler, redirect policy and
//! OAuth2 manager

pub mod cookies;

use axum::http::{
    header::{ACCEPT, AUTHORIZATION, HOST},
    HeaderMap, Uri,
};

/// `Host` header value, port included
#[must_use]
pub fn host(headers: &HeaderMap) -> Option<&str> {
    headers.get(HOST)?.to_str().ok().map(str::trim)
}

/// Host as seen by the client, honouring `X-Forwarded-Host`
#[must_use]
pub fn public_host(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("x-forwarded-host")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .or_else(|| host(headers))
}

/// Scheme as seen by the client; `http` unless `X-Forwarded-Proto` says
/// otherwise
#[must_use]
pub fn public_scheme(headers: &HeaderMap) -> &str {
    headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| *value == "https" || *value == "http")
        .unwrap_or("http")
}

/// Strip the port from a `host[:port]` value; IPv6 literals keep their
/// brackets
#[must_use]
pub fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return host.find(']').map_or(host, |end| &host[..=end]);
    }
    host.rsplit_once(':').map_or(host, |(name, _)| name)
}

/// Whether the client asked for HTML
#[must_use]
pub fn wants_html(headers: &HeaderMap) -> bool {
    headers
        .get(ACCEPT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

/// First value of a query parameter, percent-decoded
#[must_use]
pub fn query_param(uri: &Uri, name: &str) -> Option<String> {
    url::form_urlencoded::parse(uri.query()?.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Token from an `Authorization: Bearer` header
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_public_host_prefers_forwarded() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("internal:8080"));
        assert_eq!(public_host(&headers), Some("internal:8080"));

        headers.insert("x-forwarded-host", HeaderValue::from_static("login.example.com, proxy"));
        assert_eq!(public_host(&headers), Some("login.example.com"));
        assert_eq!(host(&headers), Some("internal:8080"));
    }

    #[test]
    fn test_public_scheme() {
        let mut headers = HeaderMap::new();
        assert_eq!(public_scheme(&headers), "http");
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        assert_eq!(public_scheme(&headers), "https");
        headers.insert("x-forwarded-proto", HeaderValue::from_static("javascript"));
        assert_eq!(public_scheme(&headers), "http");
    }

    #[test]
    fn test_strip_port() {
        assert_eq!(strip_port("example.com:8080"), "example.com");
        assert_eq!(strip_port("example.com"), "example.com");
        assert_eq!(strip_port("[::1]:8080"), "[::1]");
    }

    #[test]
    fn test_wants_html() {
        let mut headers = HeaderMap::new();
        assert!(!wants_html(&headers));
        headers.insert(ACCEPT, HeaderValue::from_static("text/html,application/xhtml+xml"));
        assert!(wants_html(&headers));
    }

    #[test]
    fn test_query_param_decodes() {
        let uri: Uri = "/login?backTo=%2Fapp%3Fx%3D1&logout=true".parse().unwrap();
        assert_eq!(query_param(&uri, "backTo").as_deref(), Some("/app?x=1"));
        assert_eq!(query_param(&uri, "logout").as_deref(), Some("true"));
        assert_eq!(query_param(&uri, "code"), None);
    }

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
    }
}
