//! logingate standalone server

use anyhow::{Context, Result};
use clap::Parser;
use logingate::config::{BackendConfig, Config, OAuthProviderConfig};
use logingate::gateway::Gateway;
use logingate::observability::{self, ObservabilityConfig};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "logingate")]
#[command(version)]
#[command(about = "Login micro-gateway issuing signed JWTs", long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, env = "LOGINGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Bind address
    #[arg(long)]
    host: Option<String>,

    /// Bind port
    #[arg(short, long)]
    port: Option<u16>,

    /// Shared secret for signing tokens
    #[arg(long, env = "LOGINGATE_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Path of the login endpoint
    #[arg(long)]
    login_path: Option<String>,

    /// Default target after login
    #[arg(long)]
    success_url: Option<String>,

    /// Credential backend, `provider:key=value,...` (repeatable)
    #[arg(long = "backend", value_name = "SPEC")]
    backends: Vec<String>,

    /// OAuth2 provider, `provider:client_id=..,client_secret=..` (repeatable)
    #[arg(long = "oauth", value_name = "SPEC")]
    oauth: Vec<String>,

    /// Emit JSON log lines
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    /// Load the configuration, apply command-line overrides on top, then
    /// validate once
    fn into_config(self) -> Result<Config> {
        let mut config = Config::load_unvalidated(self.config.as_deref())?;

        if let Some(host) = self.host {
            config.listen.host = host;
        }
        if let Some(port) = self.port {
            config.listen.port = port;
        }
        if let Some(secret) = self.jwt_secret {
            config.login.jwt.secret = secret;
        }
        if let Some(path) = self.login_path {
            config.login.path = path;
        }
        if let Some(url) = self.success_url {
            config.login.success_url = url;
        }
        for spec in &self.backends {
            config
                .login
                .backends
                .push(BackendConfig::parse(spec).with_context(|| format!("--backend {spec}"))?);
        }
        for spec in &self.oauth {
            config
                .login
                .oauth
                .push(OAuthProviderConfig::parse(spec).with_context(|| format!("--oauth {spec}"))?);
        }

        config.finalize()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut logging = ObservabilityConfig::default();
    if cli.log_json {
        logging = logging.with_json(true);
    }
    observability::init_with(&logging)?;

    let config = cli.into_config()?;
    let gateway = Gateway::from_config(&config)?;
    tracing::info!(
        login_path = %config.login.path,
        vhosts = gateway.vhosts().len(),
        "gateway configured"
    );

    let addr = format!("{}:{}", config.listen.host, config.listen.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, gateway.into_router())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for ctrl-c");
    }
}
