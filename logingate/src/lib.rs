//! logingate: login micro-gateway issuing signed JWTs
//!
//! logingate sits in front of other applications and answers one question:
//! who is this user? It verifies username/password pairs against pluggable
//! backends or runs an OAuth2 three-legged flow, resolves the claims to embed,
//! and issues an HMAC-signed JWT as a cookie (browsers) or response body
//! (API clients).
//!
//! # Pipeline
//!
//! 1. The [`vhost`] router picks the [`handler::LoginHandler`] for the `Host`.
//! 2. The handler parks a requested redirect target ([`redirect`]).
//! 3. Credentials go through the [`backends`] chain, or the [`oauth2`]
//!    manager runs the provider flow.
//! 4. [`claims`] turns the identity into the claim set, [`token`] signs it.
//! 5. The redirect policy decides where the browser goes next.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use logingate::{config::Config, gateway::Gateway};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     logingate::observability::init()?;
//!
//!     let config = Config::load(None)?;
//!     let app = Gateway::from_config(&config)?.into_router();
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:6789").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

#![allow(clippy::missing_errors_doc)]

pub mod auth;
pub mod backends;
pub mod claims;
pub mod config;
pub mod error;
pub mod gateway;
pub mod handler;
pub mod health;
pub mod oauth2;
pub mod observability;
pub mod redirect;
pub mod request;
pub mod template;
pub mod token;
pub mod vhost;

pub mod prelude {
    //! Convenience re-exports for embedding the gateway
    //!
    //! ```rust
    //! use logingate::prelude::*;
    //! ```

    pub use crate::auth::{Claims, UserInfo};
    pub use crate::backends::{Backend, BackendError, BackendRegistry};
    pub use crate::claims::{ClaimsProvider, ClaimsRule};
    pub use crate::config::{BackendConfig, Config, LoginSettings, OAuthProviderConfig, VhostConfig};
    pub use crate::error::{ConfigError, LoginError};
    pub use crate::gateway::Gateway;
    pub use crate::handler::LoginHandler;
    pub use crate::oauth2::{ProviderDescriptor, ProviderRegistry, UserInfoFetcher};
    pub use crate::token::TokenIssuer;
}
