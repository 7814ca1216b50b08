//! Post-login redirect policy
//!
//! A client may ask to be sent somewhere after login with a query parameter
//! (`backTo` by default). On `GET` the raw target is parked in a cookie; on
//! success the target is resolved and only honoured when it stays on the
//! current host, points to a sibling subdomain, or its host is listed in the
//! whitelist file. Everything else falls back to the success URL.
//!
//! Violations are never errors: they are logged at `warn` and the redirect
//! silently degrades to the default.

use axum::http::{request::Parts, Method};
use std::net::IpAddr;
use std::path::PathBuf;
use url::Url;

use crate::config::LoginSettings;
use crate::request::{self, cookies, cookies::Cookie};

/// Redirect policy of one login handler
#[derive(Debug, Clone)]
pub struct RedirectPolicy {
    enabled: bool,
    parameter: String,
    check_referer: bool,
    host_file: Option<PathBuf>,
    success_url: String,
    cookie_path: String,
    cookie_secure: bool,
}

impl RedirectPolicy {
    /// Policy from the login settings
    #[must_use]
    pub fn new(settings: &LoginSettings) -> Self {
        Self {
            enabled: settings.redirect.enabled,
            parameter: settings.redirect.query_parameter.clone(),
            check_referer: settings.redirect.check_referer,
            host_file: settings.redirect.host_file.clone(),
            success_url: settings.success_url.clone(),
            cookie_path: settings.path.clone(),
            cookie_secure: settings.cookie.secure,
        }
    }

    /// Name of the query parameter and cookie
    #[must_use]
    pub fn parameter(&self) -> &str {
        &self.parameter
    }

    /// Whether the request may carry a redirect target at all
    ///
    /// With referer checking on, the `Referer` host must equal the host the
    /// client sees (`X-Forwarded-Host`, else `Host`).
    #[must_use]
    pub fn allow_redirect(&self, parts: &Parts) -> bool {
        if !self.enabled {
            return false;
        }
        if !self.check_referer {
            return true;
        }

        let referer = parts
            .headers
            .get(axum::http::header::REFERER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        let Ok(referer) = Url::parse(referer) else {
            tracing::warn!(referer, "unparsable referer, ignoring redirect target");
            return false;
        };

        let current = request::public_host(&parts.headers).unwrap_or_default();
        if !authority(&referer).eq_ignore_ascii_case(current) {
            tracing::warn!(
                referer = %referer,
                host = current,
                "referer host differs from request host, ignoring redirect target"
            );
            return false;
        }
        true
    }

    /// Cookie parking the requested target, for `GET` requests carrying one
    #[must_use]
    pub fn redirect_cookie(&self, parts: &Parts) -> Option<Cookie> {
        if parts.method != Method::GET {
            return None;
        }
        let target = request::query_param(&parts.uri, &self.parameter)?;
        if target.is_empty() || !self.allow_redirect(parts) {
            return None;
        }
        let value: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
        Some(
            Cookie::new(self.parameter.clone(), value)
                .with_path(self.cookie_path.clone())
                .secure(self.cookie_secure),
        )
    }

    /// Cookie removing the parked target
    #[must_use]
    pub fn clear_cookie(&self) -> Cookie {
        Cookie::removal(self.parameter.clone()).with_path(self.cookie_path.clone())
    }

    /// Where to send the client after a successful login
    #[must_use]
    pub fn resolve(&self, parts: &Parts) -> String {
        self.candidate(parts)
            .and_then(|target| self.evaluate(parts, &target))
            .unwrap_or_else(|| self.success_url.clone())
    }

    fn candidate(&self, parts: &Parts) -> Option<String> {
        if !self.enabled {
            return None;
        }
        if let Some(raw) = cookies::get(&parts.headers, &self.parameter).filter(|v| !v.is_empty()) {
            return url::form_urlencoded::parse(raw.as_bytes())
                .next()
                .map(|(target, _)| target.into_owned());
        }
        if parts.method == Method::POST && self.allow_redirect(parts) {
            return request::query_param(&parts.uri, &self.parameter);
        }
        None
    }

    fn evaluate(&self, parts: &Parts, target: &str) -> Option<String> {
        let current = request::public_host(&parts.headers)?;
        let base = Url::parse(&format!("{}://{current}/", request::public_scheme(&parts.headers))).ok()?;
        let url = base.join(target).ok()?;

        if !matches!(url.scheme(), "http" | "https") || !has_path(target) {
            tracing::warn!(target, "redirect target without usable path, using default");
            return None;
        }

        if authority(&url) == current {
            let mut path = format!("/{}", url.path().trim_start_matches('/'));
            if let Some(query) = url.query() {
                path.push('?');
                path.push_str(query);
            }
            return Some(path);
        }

        let target_host = url.host_str().unwrap_or_default();
        if is_sibling(target_host, request::strip_port(current)) {
            return Some(url.to_string());
        }
        if self.is_whitelisted(target_host, &authority(&url)) {
            return Some(url.to_string());
        }

        tracing::warn!(target, "redirect target not allowed, using default");
        None
    }

    fn is_whitelisted(&self, host: &str, authority: &str) -> bool {
        let Some(path) = &self.host_file else {
            return false;
        };
        match std::fs::read_to_string(path) {
            Ok(content) => content
                .lines()
                .map(str::trim)
                .any(|line| !line.is_empty() && (line == host || line == authority)),
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "cannot read redirect host file");
                false
            }
        }
    }
}

/// `host[:port]` of a URL, the port only when not the scheme default
fn authority(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    url.port()
        .map_or_else(|| host.to_string(), |port| format!("{host}:{port}"))
}

/// Whether a raw target has a path after its authority
///
/// `https://example.com` and `//example.com` have none; relative targets
/// always do.
fn has_path(target: &str) -> bool {
    let rest = match target.find("://") {
        Some(index) if !target[..index].contains('/') => &target[index + 3..],
        _ => match target.strip_prefix("//") {
            Some(rest) => rest,
            None => return !target.is_empty(),
        },
    };
    rest.find(['/', '?', '#'])
        .is_some_and(|index| rest[index..].starts_with('/'))
}

/// Both hosts have at least three labels and share everything after the
/// first one
fn is_sibling(target: &str, current: &str) -> bool {
    if target.parse::<IpAddr>().is_ok() || current.parse::<IpAddr>().is_ok() {
        return false;
    }
    let parent = |host: &str| -> Option<String> {
        let labels: Vec<&str> = host.split('.').collect();
        (labels.len() >= 3 && labels.iter().all(|l| !l.is_empty())).then(|| labels[1..].join("."))
    };
    match (parent(target), parent(current)) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(&b),
        _ => false,
    }
}
