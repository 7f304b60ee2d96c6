//! Configuration loading

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Lowest PBKDF2 cost accepted from configuration
const MIN_PBKDF2_ITERATIONS: u32 = 10_000;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Realm advertised in `WWW-Authenticate` challenges
    #[serde(default = "default_realm")]
    pub realm: String,
    /// Failed logins before an account is locked
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Lockout length, counted from the most recent failure
    #[serde(default = "default_lockout_secs")]
    pub lockout_secs: u64,
    #[serde(default = "default_pbkdf2_iterations")]
    pub pbkdf2_iterations: u32,
    /// How often expired attempt records are purged
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Create the default accounts and sample products on an empty database
    #[serde(default = "default_seed_default_users")]
    pub seed_default_users: bool,
    /// Path prefixes signed-in users may read without the admin role
    #[serde(default = "default_browse_prefixes")]
    pub browse_prefixes: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            realm: default_realm(),
            max_attempts: default_max_attempts(),
            lockout_secs: default_lockout_secs(),
            pbkdf2_iterations: default_pbkdf2_iterations(),
            sweep_interval_secs: default_sweep_interval_secs(),
            seed_default_users: default_seed_default_users(),
            browse_prefixes: default_browse_prefixes(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_db_path() -> String {
    "./data/catalog.db".to_string()
}

fn default_realm() -> String {
    catalog_api::DEFAULT_REALM.to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_lockout_secs() -> u64 {
    180
}

fn default_pbkdf2_iterations() -> u32 {
    catalog_auth::password::DEFAULT_ITERATIONS
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_seed_default_users() -> bool {
    true
}

fn default_browse_prefixes() -> Vec<String> {
    catalog_api::pipeline::DEFAULT_BROWSE_PREFIXES
        .iter()
        .map(|p| p.to_string())
        .collect()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &str) -> Result<Self> {
        let config_path = Path::new(path);

        if !config_path.exists() {
            info!("Config file not found at {}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;
        config.validate();

        Ok(config)
    }

    /// Replace out-of-range values with safe ones
    fn validate(&mut self) {
        if self.auth.max_attempts == 0 {
            warn!("auth.max_attempts must be at least 1, using 1");
            self.auth.max_attempts = 1;
        }
        if self.auth.pbkdf2_iterations < MIN_PBKDF2_ITERATIONS {
            warn!(
                "auth.pbkdf2_iterations {} is below minimum {}, using minimum",
                self.auth.pbkdf2_iterations, MIN_PBKDF2_ITERATIONS
            );
            self.auth.pbkdf2_iterations = MIN_PBKDF2_ITERATIONS;
        }
        if self.auth.sweep_interval_secs == 0 {
            warn!("auth.sweep_interval_secs must be positive, using default");
            self.auth.sweep_interval_secs = default_sweep_interval_secs();
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            warn!(
                "Unknown logging.format '{}', using pretty",
                self.logging.format
            );
            self.logging.format = default_log_format();
        }
    }
}
