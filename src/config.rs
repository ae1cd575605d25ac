//! A1 — Configuration.
//!
//! Grounded on the teacher's `config.rs`: CLI arguments via `clap::Parser`
//! layered over environment variables, each field with a hardcoded fallback
//! default (`config_defaults` module). The teacher's multi-chain
//! `ChainsConfig`/`LiteralOrEnv<T>` machinery has no counterpart here — this
//! gateway's network catalogue is a fixed static table
//! ([`crate::model::network`]), not something an operator configures.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;
use url::Url;

/// Server configuration, loaded from CLI flags with environment-variable
/// fallbacks per flag, and hardcoded defaults beneath those.
#[derive(Parser, Debug, Clone)]
#[command(name = "x402-gateway")]
#[command(about = "Pay-per-request agent gateway")]
pub struct Config {
    #[arg(long, env = "PORT", default_value_t = config_defaults::default_port())]
    port: u16,

    #[arg(long, env = "HOST", default_value_t = config_defaults::default_host())]
    host: IpAddr,

    /// Base URL of the backend service that performs `screenshot` and
    /// `markdown-to-pdf` rendering. Unset means those skills run in
    /// placeholder mode.
    #[arg(long, env = "BACKEND_URL")]
    backend_url: Option<Url>,

    #[arg(long, env = "BACKEND_API_KEY")]
    backend_key: Option<String>,

    /// Base URL of the configured AI provider for `ai-analysis`.
    #[arg(long, env = "AI_PROVIDER_URL")]
    ai_provider_url: Option<Url>,

    #[arg(long, env = "AI_PROVIDER_API_KEY")]
    ai_provider_key: Option<String>,

    /// Externally reachable base URL, advertised in the agent card and
    /// payment-requirements `resource` fields.
    #[arg(long, env = "PUBLIC_URL", default_value = "http://localhost:4002")]
    public_url: Url,

    /// Bearer key gating the `/stats` endpoint. Unset disables the endpoint.
    #[arg(long, env = "STATS_API_KEY")]
    stats_api_key: Option<String>,

    #[arg(long, env = "SNAPSHOT_PATH", default_value = "snapshot.json")]
    snapshot_path: PathBuf,

    #[arg(long, env = "SNAPSHOT_INTERVAL_SECONDS", default_value_t = config_defaults::DEFAULT_SNAPSHOT_INTERVAL_SECONDS)]
    snapshot_interval_seconds: u64,
}

pub mod config_defaults {
    use std::env;
    use std::net::IpAddr;

    pub const DEFAULT_PORT: u16 = 4002;
    pub const DEFAULT_HOST: &str = "0.0.0.0";
    pub const DEFAULT_SNAPSHOT_INTERVAL_SECONDS: u64 = 60;

    pub fn default_port() -> u16 {
        env::var("PORT").ok().and_then(|s| s.parse().ok()).unwrap_or(DEFAULT_PORT)
    }

    pub fn default_host() -> IpAddr {
        env::var("HOST")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(IpAddr::V4(DEFAULT_HOST.parse().unwrap()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse CLI/environment configuration: {0}")]
    Cli(#[from] clap::Error),
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Config::try_parse()?)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn host(&self) -> IpAddr {
        self.host
    }

    pub fn backend_url(&self) -> Option<&str> {
        self.backend_url.as_ref().map(Url::as_str)
    }

    pub fn backend_key(&self) -> Option<&str> {
        self.backend_key.as_deref()
    }

    pub fn ai_provider_url(&self) -> Option<&str> {
        self.ai_provider_url.as_ref().map(Url::as_str)
    }

    pub fn ai_provider_key(&self) -> Option<&str> {
        self.ai_provider_key.as_deref()
    }

    pub fn public_url(&self) -> &Url {
        &self.public_url
    }

    pub fn stats_api_key(&self) -> Option<&str> {
        self.stats_api_key.as_deref()
    }

    pub fn snapshot_path(&self) -> &PathBuf {
        &self.snapshot_path
    }

    pub fn snapshot_interval_seconds(&self) -> u64 {
        self.snapshot_interval_seconds
    }

    /// A config with no backend/AI provider configured and a throwaway
    /// snapshot path, for tests that need a `Config` but not a CLI.
    #[cfg(any(test, feature = "test-util"))]
    pub fn for_tests() -> Self {
        Config {
            port: config_defaults::DEFAULT_PORT,
            host: config_defaults::default_host(),
            backend_url: None,
            backend_key: None,
            ai_provider_url: None,
            ai_provider_key: None,
            public_url: Url::parse("http://localhost:8080").unwrap(),
            stats_api_key: None,
            snapshot_path: PathBuf::from("test-snapshot.json"),
            snapshot_interval_seconds: config_defaults::DEFAULT_SNAPSHOT_INTERVAL_SECONDS,
        }
    }
}
