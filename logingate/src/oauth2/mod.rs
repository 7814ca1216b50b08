//! OAuth2 login
//!
//! Providers are described by a [`ProviderDescriptor`] (endpoints and default
//! scope) plus a [`UserInfoFetcher`] that turns an access token into a
//! [`UserInfo`](crate::auth::UserInfo). A [`ProviderRegistry`] holds them by
//! name; each login handler owns an [`OAuthManager`] configured with its own
//! client credentials.
//!
//! # Routes
//!
//! - `GET {login_path}/{provider}` starts the flow: a random state is stored
//!   in an HTTP-only cookie and the browser is redirected to the provider.
//! - `GET {login_path}/{provider}?code=..&state=..` (or the `/callback`
//!   suffix) completes it: the state is verified, the code exchanged and the
//!   user info fetched.

pub mod http;
pub mod manager;
pub mod providers;
pub mod registry;
pub mod types;

pub use manager::{OAuthManager, OAuthOutcome, STATE_COOKIE};
pub use registry::ProviderRegistry;
pub use types::{OAuthError, Provider, ProviderDescriptor, UserInfoFetcher};
