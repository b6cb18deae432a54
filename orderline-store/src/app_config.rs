use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub inventory: InventoryConfig,
    #[serde(default)]
    pub resiliency: ResiliencyConfig,
}

/// Which services this process hosts.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    All,
    Users,
    Inventory,
    Orders,
}

impl Role {
    pub fn default_port(self) -> u16 {
        match self {
            Role::Users => 50051,
            Role::Inventory => 50052,
            Role::Orders | Role::All => 50053,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ServerConfig {
    pub port: Option<u16>,
    #[serde(default)]
    pub role: Role,
}

impl ServerConfig {
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.role.default_port())
    }
}

/// Where the `orders` role finds the other two services.
#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamConfig {
    #[serde(default = "default_users_url")]
    pub users_url: String,
    #[serde(default = "default_inventory_url")]
    pub inventory_url: String,
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

impl UpstreamConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            users_url: default_users_url(),
            inventory_url: default_inventory_url(),
            call_timeout_ms: default_call_timeout_ms(),
        }
    }
}

fn default_users_url() -> String { "http://127.0.0.1:50051".into() }
fn default_inventory_url() -> String { "http://127.0.0.1:50052".into() }
fn default_call_timeout_ms() -> u64 { 2000 }

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum InventoryBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InventoryConfig {
    #[serde(default)]
    pub backend: InventoryBackend,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self { backend: InventoryBackend::Memory, redis_url: default_redis_url() }
    }
}

fn default_redis_url() -> String { "redis://127.0.0.1:6379".into() }

#[derive(Debug, Deserialize, Clone)]
pub struct ResiliencyConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: usize,
    #[serde(default = "default_reset_timeout_seconds")]
    pub reset_timeout_seconds: u64,
}

impl ResiliencyConfig {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_secs(self.reset_timeout_seconds)
    }
}

impl Default for ResiliencyConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            reset_timeout_seconds: default_reset_timeout_seconds(),
        }
    }
}

fn default_failure_threshold() -> usize { 5 }
fn default_reset_timeout_seconds() -> u64 { 30 }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `ORDERLINE__SERVER__ROLE=orders`
            .add_source(config::Environment::with_prefix("ORDERLINE").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    /// Parse a single TOML document with no file or environment layering.
    pub fn from_toml(source: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
