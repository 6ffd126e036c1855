//! API configuration
//!
//! Values come from `API_*` environment variables layered over
//! [`ApiConfig::default`]. Nested gateway settings use a double underscore,
//! e.g. `API_GATEWAY__STORE_ID`.

use domain_payments::adapters::GatewaySettings;
use serde::{Deserialize, Serialize};

/// Where bookings and payments are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    /// Process-local store; state is lost on restart
    Memory,
}

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// JWT secret for authentication
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    /// JWT expiration in seconds
    pub jwt_expiration_secs: u64,
    /// Database URL
    pub database_url: String,
    /// Log level
    pub log_level: String,
    pub log_format: LogFormat,
    pub storage_backend: StorageBackend,
    /// Base URL the checkout redirect sends the tourist back to
    pub frontend_url: String,
    #[serde(default)]
    pub gateway: GatewaySettings,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            database_url: "postgres://localhost/tour_payments".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            storage_backend: StorageBackend::Postgres,
            frontend_url: "http://localhost:3000/payment".to_string(),
            gateway: GatewaySettings::default(),
        }
    }
}

impl ApiConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let defaults = ApiConfig::default();

        config::Config::builder()
            .add_source(config::Config::try_from(&defaults)?)
            .set_default("jwt_secret", defaults.jwt_secret)?
            .add_source(
                config::Environment::with_prefix("API")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Absolute frontend URL for a path relative to `frontend_url`
    pub fn frontend_location(&self, path: &str) -> String {
        format!("{}{}", self.frontend_url.trim_end_matches('/'), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.server_addr(), "0.0.0.0:8080");
        assert_eq!(config.storage_backend, StorageBackend::Postgres);
        assert!(config.gateway.sandbox);
    }

    #[test]
    fn test_frontend_location_joins_without_double_slash() {
        let config = ApiConfig {
            frontend_url: "https://tours.example/payment/".to_string(),
            ..ApiConfig::default()
        };
        assert_eq!(
            config.frontend_location("/cancelled"),
            "https://tours.example/payment/cancelled"
        );
    }

    #[test]
    fn test_storage_backend_names() {
        let backend: StorageBackend = serde_json::from_str("\"memory\"").unwrap();
        assert_eq!(backend, StorageBackend::Memory);
    }
}
