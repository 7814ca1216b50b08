//! Apache htpasswd file backend
//!
//! Supported hash formats are bcrypt (`$2y$`, `$2b$`, `$2a$`), SHA-crypt
//! (`$5$`, `$6$`), MD5-crypt (`$1$`), traditional DES crypt and `{SHA}`.
//! The file is re-read when its modification time changes; the check happens
//! on each authentication, there is no background watcher.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use parking_lot::RwLock;
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::SystemTime;

use super::{Backend, BackendError, BackendOptions};
use crate::auth::UserInfo;
use crate::error::ConfigError;

/// Registry name
pub const NAME: &str = "htpasswd";

#[derive(Debug, Default)]
struct Entries {
    modified: Option<SystemTime>,
    hashes: HashMap<String, String>,
}

/// Backend verifying against an htpasswd file
#[derive(Debug)]
pub struct HtpasswdBackend {
    path: PathBuf,
    entries: RwLock<Entries>,
}

impl HtpasswdBackend {
    /// Requires the `file` option
    ///
    /// # Errors
    ///
    /// Returns an error if the option is missing or the file cannot be read.
    pub fn from_options(options: &BackendOptions) -> Result<Self, ConfigError> {
        let path = options
            .get("file")
            .map(PathBuf::from)
            .ok_or_else(|| ConfigError::MissingParameter {
                component: NAME.to_string(),
                parameter: "file".to_string(),
            })?;

        let backend = Self {
            path,
            entries: RwLock::new(Entries::default()),
        };
        backend.reload_if_changed().map_err(|err| match err {
            BackendError::Io { path, source } => ConfigError::Io { path, source },
            other => ConfigError::Invalid(other.to_string()),
        })?;
        Ok(backend)
    }

    fn io_error(&self, source: std::io::Error) -> BackendError {
        BackendError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    /// Blocking load, for construction at startup
    fn reload_if_changed(&self) -> Result<(), BackendError> {
        let modified = std::fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .map_err(|e| self.io_error(e))?;
        if self.is_current(modified) {
            return Ok(());
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        self.store(modified, &content);
        Ok(())
    }

    /// Request-time reload through `tokio::fs`
    async fn refresh(&self) -> Result<(), BackendError> {
        let modified = tokio::fs::metadata(&self.path)
            .await
            .and_then(|meta| meta.modified())
            .map_err(|e| self.io_error(e))?;
        if self.is_current(modified) {
            return Ok(());
        }
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        self.store(modified, &content);
        Ok(())
    }

    fn is_current(&self, modified: SystemTime) -> bool {
        self.entries.read().modified == Some(modified)
    }

    fn store(&self, modified: SystemTime, content: &str) {
        let hashes = parse(content);
        tracing::debug!(file = %self.path.display(), users = hashes.len(), "htpasswd loaded");
        *self.entries.write() = Entries {
            modified: Some(modified),
            hashes,
        };
    }
}

fn parse(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once(':'))
        .map(|(user, hash)| (user.to_string(), hash.to_string()))
        .collect()
}

fn verify(password: &str, hash: &str) -> bool {
    if let Some(digest) = hash.strip_prefix("{SHA}") {
        return STANDARD.encode(Sha1::digest(password.as_bytes())) == digest;
    }
    pwhash::unix::verify(password, hash)
}

#[async_trait]
impl Backend for HtpasswdBackend {
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserInfo>, BackendError> {
        self.refresh().await?;
        let hash = self.entries.read().hashes.get(username).cloned();

        Ok(hash
            .filter(|hash| verify(password, hash))
            .map(|_| UserInfo::new(username, NAME)))
    }

    fn name(&self) -> &'static str {
        NAME
    }
}
