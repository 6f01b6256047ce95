use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub journal: JournalConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JournalConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    pub hold_ttl_seconds: u64,
    pub sweep_interval_seconds: u64,
    pub slot_granularity_minutes: i64,
    pub min_lead_minutes: i64,
    pub advance_booking_days: i64,
    #[serde(default = "default_max_party_size")]
    pub max_party_size: i32,
    pub guarantee_percent: f64,
    pub free_cancellation_hours: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_max_party_size() -> i32 {
    4
}

fn default_currency() -> String {
    "EUR".to_string()
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Add in the current environment file
            // Default to 'development' env
            // Note that this file is _optional_
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked in to git
            .add_source(config::File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of CALMA)
            // Eg.. `CALMA_SERVER__PORT=9000` would set the server port
            .add_source(config::Environment::with_prefix("CALMA").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
