//! Observability (structured logging)
//!
//! Every component logs through `tracing` with key/value fields. Policy
//! violations (state mismatch, foreign referer, rejected redirect target) are
//! logged at `warn`, upstream failures at `error`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the logging stack with defaults for the build profile
///
/// # Example
///
/// ```rust,no_run
/// # fn main() -> anyhow::Result<()> {
/// logingate::observability::init()?;
/// tracing::info!("gateway starting");
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init() -> anyhow::Result<()> {
    init_with(&ObservabilityConfig::default())
}

/// Initialize the logging stack from an explicit configuration
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_with(config: &ObservabilityConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            EnvFilter::new("debug,logingate=trace,hyper=info,reqwest=info")
        } else {
            EnvFilter::new("info")
        }
    });

    if config.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()?;
    }

    tracing::debug!(service = %config.service_name, json = config.json, "logging initialized");
    Ok(())
}

/// Observability configuration
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Service name attached to the startup event
    pub service_name: String,

    /// Emit JSON lines instead of the pretty format
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "logingate".to_string(),
            json: !cfg!(debug_assertions),
        }
    }
}

impl ObservabilityConfig {
    /// Create a new observability config
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Force JSON output
    #[must_use]
    pub const fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }
}
