use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub wizard: WizardConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

/// Business rules for the migration wizard.
#[derive(Debug, Deserialize, Clone)]
pub struct WizardConfig {
    /// Session starts allowed per user inside the sliding window.
    #[serde(default = "default_rate_limit_capacity")]
    pub rate_limit_capacity: u32,
    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window_seconds: u64,
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    #[serde(default = "default_min_brand_results")]
    pub min_brand_results: usize,
    #[serde(default = "default_max_stores")]
    pub max_stores: usize,
}

fn default_rate_limit_capacity() -> u32 {
    5
}

fn default_rate_limit_window() -> u64 {
    3600
}

fn default_max_candidates() -> usize {
    5
}

fn default_min_brand_results() -> usize {
    2
}

fn default_max_stores() -> usize {
    2
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("RELIST").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
