//! Application configuration loaded from environment variables.

use domain::DeliverySettings;
use thiserror::Error;

/// Payment secret used when `PAYMENT_KEY_SECRET` is unset. Local runs only.
pub const DEV_PAYMENT_SECRET: &str = "dev_payment_secret";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default `0.0.0.0`)
/// - `PORT`: listen port (default `3000`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `LOG_FORMAT`: `text` or `json` (default `text`)
/// - `DATABASE_URL`: PostgreSQL URL; unset keeps everything in memory
/// - `PAYMENT_KEY_SECRET`: gateway signing secret
/// - `PAYMENT_CURRENCY`: currency for payment intents (default `INR`)
/// - `DELIVERY_SETTINGS`: delivery tariff as JSON (default: free delivery)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub payment_key_secret: String,
    pub payment_currency: String,
    pub delivery_settings: Option<DeliverySettings>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let port = match var("PORT") {
            Some(port) => port.parse().map_err(|e| ConfigError::Invalid {
                name: "PORT",
                reason: format!("{e}"),
            })?,
            None => defaults.port,
        };

        let log_format = match var("LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "LOG_FORMAT",
                    reason: format!("expected text or json, got {other}"),
                });
            }
        };

        let delivery_settings = match var("DELIVERY_SETTINGS") {
            Some(json) => {
                Some(
                    serde_json::from_str(&json).map_err(|e| ConfigError::Invalid {
                        name: "DELIVERY_SETTINGS",
                        reason: e.to_string(),
                    })?,
                )
            }
            None => None,
        };

        Ok(Self {
            host: var("HOST").unwrap_or(defaults.host),
            port,
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format,
            database_url: var("DATABASE_URL"),
            payment_key_secret: var("PAYMENT_KEY_SECRET").unwrap_or(defaults.payment_key_secret),
            payment_currency: var("PAYMENT_CURRENCY").unwrap_or(defaults.payment_currency),
            delivery_settings,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.payment_key_secret == DEV_PAYMENT_SECRET
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            payment_key_secret: DEV_PAYMENT_SECRET.to_string(),
            payment_currency: "INR".to_string(),
            delivery_settings: None,
        }
    }
}
