//! Login request handling
//!
//! One [`LoginHandler`] serves the login path of one virtual host:
//!
//! - `GET {path}` renders the form (or the logged-in view, or logs out with
//!   `?logout=true`) and parks a requested redirect target in a cookie.
//! - `POST {path}` verifies credentials against the backend chain, or
//!   refreshes a presented token when no credentials are sent.
//! - `GET|POST {path}/{provider}` runs the OAuth2 flow; the start leg parks
//!   a redirect target the same way the form does.
//!
//! Success signs a token, sets it as a cookie and answers `303` to HTML
//! clients or `200 application/jwt` to everybody else.

use axum::{
    body::Body,
    extract::{FromRequest, Multipart},
    http::{
        header::{CONTENT_TYPE, LOCATION},
        request::Parts,
        HeaderValue, Method, Request, StatusCode,
    },
    response::{Html, IntoResponse, Response},
    Form, Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::{Claims, UserInfo};
use crate::backends::{authenticate_chain, Backend, BackendRegistry};
use crate::claims::{self, ClaimsProvider};
use crate::config::LoginSettings;
use crate::error::{ConfigError, LoginError, OAuthError, TemplateError};
use crate::oauth2::{OAuthManager, OAuthOutcome, ProviderRegistry};
use crate::redirect::RedirectPolicy;
use crate::request::{self, cookies, cookies::Cookie};
use crate::template::{FormContext, LoginTemplate};
use crate::token::TokenIssuer;

/// Username and password from a login request
#[derive(Debug, Default, Deserialize)]
struct Credentials {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

impl Credentials {
    const fn is_empty(&self) -> bool {
        self.username.is_empty() && self.password.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Form,
    Multipart,
}

fn body_kind(parts: &Parts) -> Option<BodyKind> {
    let content_type = parts.headers.get(CONTENT_TYPE)?.to_str().ok()?;
    let mime = content_type.split(';').next()?.trim().to_ascii_lowercase();
    match mime.as_str() {
        "application/json" => Some(BodyKind::Json),
        "application/x-www-form-urlencoded" => Some(BodyKind::Form),
        "multipart/form-data" => Some(BodyKind::Multipart),
        _ => None,
    }
}

/// How a login attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    WrongCredentials,
    Internal,
}

/// Login endpoint of one virtual host
pub struct LoginHandler {
    settings: LoginSettings,
    backends: Vec<Arc<dyn Backend>>,
    oauth: OAuthManager,
    claims: Arc<dyn ClaimsProvider>,
    redirect: RedirectPolicy,
    issuer: TokenIssuer,
    template: LoginTemplate,
}

impl std::fmt::Debug for LoginHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginHandler")
            .field("path", &self.settings.path)
            .field("backends", &self.backend_names())
            .field("oauth", &self.oauth)
            .finish_non_exhaustive()
    }
}

impl LoginHandler {
    /// Build a handler and everything it owns from its settings
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unknown backends or providers,
    /// invalid options, or an unreadable template or rule file.
    pub fn new(
        settings: LoginSettings,
        backend_registry: &BackendRegistry,
        provider_registry: &ProviderRegistry,
    ) -> Result<Self, ConfigError> {
        let backends = backend_registry.build_all(&settings.backends)?;
        let oauth = OAuthManager::new(provider_registry, &settings.path, &settings.oauth)?;
        let claims = claims::from_settings(&settings.claims, &settings.users)?;
        let template = LoginTemplate::load(settings.template.as_deref()).map_err(|e| match e {
            TemplateError::ReadFailed { path, source } => ConfigError::Io { path, source },
            TemplateError::Render(e) => ConfigError::InvalidParameter {
                component: "login".to_string(),
                parameter: "template".to_string(),
                reason: e.to_string(),
            },
        })?;

        if backends.is_empty() && settings.oauth.is_empty() {
            tracing::warn!(path = %settings.path, "login handler without backends or oauth2 providers");
        }

        Ok(Self {
            redirect: RedirectPolicy::new(&settings),
            issuer: TokenIssuer::new(&settings.jwt),
            backends,
            oauth,
            claims,
            template,
            settings,
        })
    }

    /// Settings this handler was built from
    #[must_use]
    pub const fn settings(&self) -> &LoginSettings {
        &self.settings
    }

    /// Configured backend names, in chain order
    #[must_use]
    pub fn backend_names(&self) -> Vec<&str> {
        self.settings
            .backends
            .iter()
            .map(|backend| backend.provider.as_str())
            .collect()
    }

    /// Serve one request
    pub async fn handle(&self, request: Request<Body>) -> Response {
        let (parts, body) = request.into_parts();
        let path = parts.uri.path();
        let on_login_path = path == self.settings.path;

        if !on_login_path && !self.oauth.is_flow_path(path) {
            return (StatusCode::NOT_FOUND, "Not Found").into_response();
        }

        let accepted = parts.method == Method::GET
            || (parts.method == Method::POST && body_kind(&parts).is_some());
        if !accepted {
            return LoginError::BadRequest("Method or content-type not supported".to_string())
                .into_response();
        }

        if !on_login_path {
            return self.handle_oauth(&parts).await;
        }

        if parts.method == Method::GET {
            self.handle_get(&parts)
        } else {
            self.handle_post(parts, body).await
        }
    }

    fn handle_get(&self, parts: &Parts) -> Response {
        if request::query_param(&parts.uri, "logout").as_deref() == Some("true") {
            return self.logout();
        }

        let user = self.verified_cookie(parts);
        let mut response = self.render(
            StatusCode::OK,
            FormContext {
                authenticated: user.is_some(),
                user,
                ..self.form_context()
            },
        );
        if let Some(cookie) = self.redirect.redirect_cookie(parts) {
            cookie.append_to(response.headers_mut());
        }
        response
    }

    async fn handle_post(&self, parts: Parts, body: Body) -> Response {
        let credentials = match read_credentials(&parts, body).await {
            Ok(credentials) => credentials,
            Err(err) => return err.into_response(),
        };

        if credentials.is_empty() {
            return self.refresh(&parts);
        }

        match authenticate_chain(&self.backends, &credentials.username, &credentials.password).await {
            Ok(Some(user)) => self.login_success(&parts, &user).await,
            Ok(None) => {
                tracing::info!(username = %credentials.username, "login failed: wrong credentials");
                self.failure(&parts, Failure::WrongCredentials)
            }
            Err(err) => {
                tracing::error!(username = %credentials.username, error = %err, "backend failed");
                self.failure(&parts, Failure::Internal)
            }
        }
    }

    async fn handle_oauth(&self, parts: &Parts) -> Response {
        let cleanup = self.oauth.state_cleanup(parts);
        let mut response = match self.oauth.handle(parts).await {
            Ok(OAuthOutcome::Redirect { location, state_cookie }) => {
                let mut response = redirect(&location);
                state_cookie.append_to(response.headers_mut());
                if let Some(cookie) = self.redirect.redirect_cookie(parts) {
                    cookie.append_to(response.headers_mut());
                }
                response
            }
            Ok(OAuthOutcome::Authenticated(user)) => self.login_success(parts, &user).await,
            Err(err @ OAuthError::UnknownProvider(_)) => LoginError::from(err).into_response(),
            Err(err) => {
                tracing::error!(path = %parts.uri.path(), error = %err, "oauth2 login failed");
                self.failure(parts, Failure::Internal)
            }
        };
        if let Some(cookie) = cleanup {
            cookie.append_to(response.headers_mut());
        }
        response
    }

    fn refresh(&self, parts: &Parts) -> Response {
        let token = cookies::get(&parts.headers, &self.settings.cookie.name)
            .or_else(|| request::bearer_token(&parts.headers));
        let Some(claims) = token.and_then(|token| self.issuer.verify(token).ok()) else {
            return self.failure(parts, Failure::WrongCredentials);
        };

        match self.issuer.refresh(&claims, self.settings.jwt.refreshes) {
            Ok(Some(token)) => {
                tracing::info!(sub = ?claims.get("sub"), "token refreshed");
                self.token_response(parts, token)
            }
            Ok(None) => (StatusCode::FORBIDDEN, "Max JWT refreshes reached").into_response(),
            Err(err) => {
                tracing::error!(error = %err, "token refresh failed");
                self.failure(parts, Failure::Internal)
            }
        }
    }

    async fn login_success(&self, parts: &Parts, user: &UserInfo) -> Response {
        let token = match self.sign(user).await {
            Ok(token) => token,
            Err(err) => {
                tracing::error!(sub = %user.sub, error = %err, "cannot issue token");
                return self.failure(parts, Failure::Internal);
            }
        };
        tracing::info!(sub = %user.sub, origin = %user.origin, "login succeeded");
        self.token_response(parts, token)
    }

    async fn sign(&self, user: &UserInfo) -> Result<String, LoginError> {
        let claims = self.claims.claims(user).await?;
        Ok(self.issuer.issue(&claims)?)
    }

    fn token_response(&self, parts: &Parts, token: String) -> Response {
        let cookie = self.session_cookie(token.clone());
        let mut response = if request::wants_html(&parts.headers) {
            redirect(&self.redirect.resolve(parts))
        } else {
            (
                StatusCode::OK,
                [(CONTENT_TYPE, HeaderValue::from_static("application/jwt"))],
                token,
            )
                .into_response()
        };
        cookie.append_to(response.headers_mut());
        if cookies::get(&parts.headers, self.redirect.parameter()).is_some() {
            self.redirect.clear_cookie().append_to(response.headers_mut());
        }
        response
    }

    fn failure(&self, parts: &Parts, failure: Failure) -> Response {
        let status = match failure {
            Failure::WrongCredentials => StatusCode::FORBIDDEN,
            Failure::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if request::wants_html(&parts.headers) {
            return self.render(
                status,
                FormContext {
                    failure: failure == Failure::WrongCredentials,
                    error: failure == Failure::Internal,
                    ..self.form_context()
                },
            );
        }

        match failure {
            Failure::WrongCredentials => (status, "Wrong credentials").into_response(),
            Failure::Internal => (status, "Internal Server Error").into_response(),
        }
    }

    fn logout(&self) -> Response {
        let mut response = match &self.settings.logout_url {
            Some(url) => redirect(url),
            None => self.render(StatusCode::OK, self.form_context()),
        };
        Cookie::removal(self.settings.cookie.name.clone())
            .with_path(self.settings.cookie.path.clone())
            .with_domain(self.settings.cookie.domain.clone())
            .secure(self.settings.cookie.secure)
            .append_to(response.headers_mut());
        tracing::debug!("logged out");
        response
    }

    fn verified_cookie(&self, parts: &Parts) -> Option<Claims> {
        let token = cookies::get(&parts.headers, &self.settings.cookie.name)?;
        self.issuer.verify(token).ok()
    }

    fn session_cookie(&self, token: String) -> Cookie {
        let settings = &self.settings.cookie;
        Cookie::new(settings.name.clone(), token)
            .with_path(settings.path.clone())
            .with_domain(settings.domain.clone())
            .with_max_age(settings.expiry_secs)
            .http_only(settings.http_only)
            .secure(settings.secure)
    }

    fn form_context(&self) -> FormContext {
        FormContext {
            login_path: self.settings.path.clone(),
            redirect_parameter: self.redirect.parameter().to_string(),
            backends: self.backend_names().into_iter().map(str::to_string).collect(),
            providers: self.oauth.provider_names().into_iter().map(str::to_string).collect(),
            ..FormContext::default()
        }
    }

    fn render(&self, status: StatusCode, context: FormContext) -> Response {
        match self.template.render(&context) {
            Ok(html) => (status, Html(html)).into_response(),
            Err(err) => {
                tracing::error!(error = %err, "cannot render login form");
                LoginError::from(err).into_response()
            }
        }
    }
}

/// Username and password from a JSON, form or multipart body
async fn read_credentials(parts: &Parts, body: Body) -> Result<Credentials, LoginError> {
    let request = Request::from_parts(parts.clone(), body);
    match body_kind(parts) {
        Some(BodyKind::Json) => Json::<Credentials>::from_request(request, &())
            .await
            .map(|Json(credentials)| credentials)
            .map_err(|rejection| LoginError::BadRequest(rejection.body_text())),
        Some(BodyKind::Form) => Form::<Credentials>::from_request(request, &())
            .await
            .map(|Form(credentials)| credentials)
            .map_err(|rejection| LoginError::BadRequest(rejection.body_text())),
        Some(BodyKind::Multipart) => {
            let mut multipart = Multipart::from_request(request, &())
                .await
                .map_err(|rejection| LoginError::BadRequest(rejection.body_text()))?;
            let mut credentials = Credentials::default();
            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(|e| LoginError::BadRequest(e.body_text()))?
            {
                let name = field.name().map(str::to_owned);
                let value = field.text().await.map_err(|e| LoginError::BadRequest(e.body_text()))?;
                match name.as_deref() {
                    Some("username") => credentials.username = value,
                    Some("password") => credentials.password = value,
                    _ => {}
                }
            }
            Ok(credentials)
        }
        None => Err(LoginError::BadRequest("unsupported content-type".to_string())),
    }
}

fn redirect(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::SEE_OTHER, [(LOCATION, value)]).into_response(),
        Err(_) => {
            tracing::error!(location, "redirect location is not a valid header value");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}
