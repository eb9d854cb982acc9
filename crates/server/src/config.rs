use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

use exchange::coinbase::DEFAULT_BASE_URL;

/// Process configuration, read once at startup from the environment
/// (a `.env` file is loaded first when present).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub bind_addr: String,
    pub gateway_timeout: Duration,
    pub coinbase_base_url: String,
    /// When set, admin routes require this token in `x-admin-token`.
    pub admin_api_token: Option<String>,
    /// Base URL webhook links are generated against.
    pub public_base_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());

        let gateway_timeout_secs: u64 = env::var("GATEWAY_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("GATEWAY_TIMEOUT_SECS must be an integer number of seconds")?;

        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://{}", bind_addr));

        Ok(Self {
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "data/signalbot.db".to_string()),
            bind_addr,
            gateway_timeout: Duration::from_secs(gateway_timeout_secs),
            coinbase_base_url: env::var("COINBASE_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            admin_api_token: env::var("ADMIN_API_TOKEN").ok().filter(|t| !t.is_empty()),
            public_base_url,
        })
    }
}
