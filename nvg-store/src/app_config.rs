use nvg_core::BookingRules;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    /// Rate limiting is disabled when absent.
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    #[serde(default)]
    pub booking: BookingRules,
    #[serde(default)]
    pub payments: PaymentsConfig,
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
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_seconds: u64,
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout() -> u64 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: i64,
}

fn default_rate_limit() -> i64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentsConfig {
    /// Consecutive 5xx responses before `/payments` is short-circuited.
    pub circuit_failure_threshold: u32,
    pub circuit_reset_seconds: u64,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            circuit_failure_threshold: 5,
            circuit_reset_seconds: 30,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `NVG__DATABASE__URL=postgres://...`
            .add_source(config::Environment::with_prefix("NVG").separator("__"))
            .build()?;

        let config: Config = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that deserialize but cannot be used.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.booking.schedule_buffer().is_none() {
            return Err(config::ConfigError::Message(format!(
                "booking.schedule_buffer_minutes must be between 0 and {} (got {})",
                i64::MAX / 60_000,
                self.booking.schedule_buffer_minutes
            )));
        }
        Ok(())
    }
}
