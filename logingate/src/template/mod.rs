//! Login form rendering
//!
//! The form is a single minijinja template: the embedded default, or a file
//! named in the configuration. The file is read once when the handler is
//! built.

use minijinja::Environment;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

use crate::auth::Claims;

const TEMPLATE_NAME: &str = "login.html";
const DEFAULT_TEMPLATE: &str = include_str!("login.html");

/// Template errors
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Template file could not be read
    #[error("failed to read template '{path}': {source}")]
    ReadFailed {
        /// Path of the template file
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Template failed to compile or render
    #[error("template render error: {0}")]
    Render(#[from] minijinja::Error),
}

/// Values available to the login template
#[derive(Debug, Clone, Default, Serialize)]
pub struct FormContext {
    /// Login path, the form's action
    pub login_path: String,
    /// Name of the redirect query parameter
    pub redirect_parameter: String,
    /// Configured backend names; the password form is shown when non-empty
    pub backends: Vec<String>,
    /// Configured OAuth2 provider names
    pub providers: Vec<String>,
    /// Credentials were rejected
    pub failure: bool,
    /// Login failed with an internal error
    pub error: bool,
    /// A valid token was presented
    pub authenticated: bool,
    /// Claims of the presented token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Claims>,
}

/// Compiled login template
#[derive(Debug)]
pub struct LoginTemplate {
    env: Environment<'static>,
}

impl LoginTemplate {
    /// The embedded default form
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded template fails to compile.
    pub fn embedded() -> Result<Self, TemplateError> {
        Self::from_source(DEFAULT_TEMPLATE.to_string())
    }

    /// A custom form read from `path`
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or fails to compile.
    pub fn from_file(path: &Path) -> Result<Self, TemplateError> {
        let source = std::fs::read_to_string(path).map_err(|source| TemplateError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        tracing::debug!(template = %path.display(), "custom login template loaded");
        Self::from_source(source)
    }

    /// The file when given, otherwise the embedded form
    ///
    /// # Errors
    ///
    /// Returns an error if the template cannot be loaded.
    pub fn load(path: Option<&Path>) -> Result<Self, TemplateError> {
        path.map_or_else(Self::embedded, Self::from_file)
    }

    fn from_source(source: String) -> Result<Self, TemplateError> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_template_owned(TEMPLATE_NAME, source)?;
        Ok(Self { env })
    }

    /// Render the form
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    pub fn render(&self, context: &FormContext) -> Result<String, TemplateError> {
        Ok(self.env.get_template(TEMPLATE_NAME)?.render(context)?)
    }
}
