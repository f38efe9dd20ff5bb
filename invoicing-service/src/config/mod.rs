//! Configuration module for invoicing-service.

use secrecy::Secret;
use serde::Deserialize;
use service_core::config::{self as core_config, load_layered};
use service_core::error::AppError;

/// Environment prefix, e.g. `INVOICING__DATABASE__URL`.
pub const ENV_PREFIX: &str = "INVOICING";

#[derive(Debug, Clone, Deserialize)]
pub struct InvoicingConfig {
    #[serde(default)]
    pub common: core_config::Config,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_service_version")]
    pub service_version: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    /// Without a database the service keeps invoices in memory.
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

fn default_service_name() -> String {
    "invoicing-service".to_string()
}

fn default_service_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    2
}

fn default_run_migrations() -> bool {
    true
}

impl Default for InvoicingConfig {
    fn default() -> Self {
        Self {
            common: core_config::Config::default(),
            service_name: default_service_name(),
            service_version: default_service_version(),
            log_level: default_log_level(),
            otlp_endpoint: None,
            database: None,
        }
    }
}

impl InvoicingConfig {
    pub fn from_env() -> Result<Self, AppError> {
        load_layered(ENV_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn database_section_fills_pool_defaults() {
        let config: InvoicingConfig = serde_json::from_value(serde_json::json!({
            "common": { "port": 9000 },
            "database": { "url": "postgres://localhost/invoices" }
        }))
        .unwrap();

        assert_eq!(config.common.port, 9000);
        assert_eq!(config.service_name, "invoicing-service");
        let database = config.database.unwrap();
        assert_eq!(database.url.expose_secret(), "postgres://localhost/invoices");
        assert_eq!(database.max_connections, 10);
        assert_eq!(database.min_connections, 2);
        assert!(database.run_migrations);
    }

    #[test]
    fn empty_config_uses_in_memory_store() {
        let config: InvoicingConfig = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(config.database.is_none());
        assert_eq!(config.common.port, 8080);
        assert_eq!(config.log_level, "info");
    }
}
