//! Config module contains the top-level config for the app.

use std::env;
use std::time::Duration;

use config_crate::{Config as RawConfig, ConfigError, Environment, File};

/// Basic settings - HTTP binding address and database DSN
#[derive(Debug, Deserialize, Clone)]
pub struct Server {
    pub host: String,
    pub port: String,
    pub database: String,
    pub thread_count: usize,
}

/// External payment provider
#[derive(Debug, Deserialize, Clone)]
pub struct Payments {
    pub url: String,
    pub timeout_ms: u64,
}

impl Payments {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Order ledger settings
#[derive(Debug, Deserialize, Clone)]
pub struct Orders {
    /// Pending orders older than this are failed by `expire_pending_orders`
    pub pending_ttl_sec: u64,
}

impl Orders {
    pub fn pending_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_ttl_sec)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Logging {
    pub level: String,
}

/// Global app config
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: Server,
    pub payments: Payments,
    pub orders: Orders,
    pub logging: Option<Logging>,
}

impl Config {
    /// Creates config from base.toml, which are overwritten by <env>.toml, where env is one of
    /// development, test, production. After that it could be overwritten by env variables
    /// prefixed with COURSES.
    pub fn new() -> Result<Self, ConfigError> {
        let env = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        Config::with_env(env)
    }

    pub fn with_env(env: impl Into<String>) -> Result<Self, ConfigError> {
        let mut s = RawConfig::new();

        s.merge(File::with_name("config/base"))?;
        s.merge(File::with_name(&format!("config/{}", env.into())).required(false))?;
        s.merge(Environment::with_prefix("COURSES"))?;
        s.try_into()
    }
}
