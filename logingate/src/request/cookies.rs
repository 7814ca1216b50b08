//! Cookie reading and `Set-Cookie` construction

use axum::http::{
    header::{COOKIE, SET_COOKIE},
    HeaderMap,
};
use std::fmt;

/// Read a cookie value from the request headers
///
/// All `Cookie` headers are searched; the first cookie with a matching name
/// wins.
#[must_use]
pub fn get<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim())
}

/// A cookie to be set on the response
///
/// Always emitted with `SameSite=Lax` so it survives the top-level redirect
/// back from an OAuth2 provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    name: String,
    value: String,
    path: String,
    domain: Option<String>,
    max_age: Option<u64>,
    http_only: bool,
    secure: bool,
}

impl Cookie {
    /// HTTP-only cookie with path `/` and session lifetime
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: "/".to_string(),
            domain: None,
            max_age: None,
            http_only: true,
            secure: false,
        }
    }

    /// Cookie that deletes `name` in the browser
    pub fn removal(name: impl Into<String>) -> Self {
        Self::new(name, "").with_max_age(Some(0))
    }

    /// Set the cookie path
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the cookie domain
    #[must_use]
    pub fn with_domain(mut self, domain: Option<String>) -> Self {
        self.domain = domain;
        self
    }

    /// Set `Max-Age` in seconds
    #[must_use]
    pub const fn with_max_age(mut self, max_age: Option<u64>) -> Self {
        self.max_age = max_age;
        self
    }

    /// Toggle the `HttpOnly` attribute
    #[must_use]
    pub const fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Toggle the `Secure` attribute
    #[must_use]
    pub const fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Append as a `Set-Cookie` header
    pub fn append_to(&self, headers: &mut HeaderMap) {
        if let Ok(header_value) = self.to_string().parse() {
            headers.append(SET_COOKIE, header_value);
        }
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}; Path={}", self.name, self.value, self.path)?;
        if let Some(domain) = &self.domain {
            write!(f, "; Domain={domain}")?;
        }
        if let Some(max_age) = self.max_age {
            write!(f, "; Max-Age={max_age}")?;
            if max_age == 0 {
                f.write_str("; Expires=Thu, 01 Jan 1970 00:00:00 GMT")?;
            }
        }
        f.write_str("; SameSite=Lax")?;
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        if self.secure {
            f.write_str("; Secure")?;
        }
        Ok(())
    }
}
