use serde::Deserialize;
use std::env;
use std::time::Duration;
use storefront_shared::{Masked, UserId};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub payment: PaymentConfig,
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_token: Option<Masked<String>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentConfig {
    pub gateway_url: String,
    #[serde(default = "default_settlement_delay_ms")]
    pub settlement_delay_ms: u64,
}

impl PaymentConfig {
    pub fn settlement_delay(&self) -> Duration {
        Duration::from_millis(self.settlement_delay_ms)
    }
}

fn default_settlement_delay_ms() -> u64 { 2000 }

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    pub user_id: UserId,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "storefront=info".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. STOREFRONT__API__API_TOKEN=...
            .add_source(config::Environment::with_prefix("STOREFRONT").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
