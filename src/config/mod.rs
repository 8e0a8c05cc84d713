//! Configuration module for vaultctl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Backend API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Polling cadence configuration
    #[serde(default)]
    pub polling: PollingConfig,

    /// Default resource requests for new code servers
    #[serde(default)]
    pub code_server: CodeServerDefaults,
}

/// Backend API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the backend REST API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://codevault.local/api".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Polling cadence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Silent background poll interval for the project detail view
    #[serde(default = "default_detail_interval")]
    pub detail_interval_secs: u64,

    /// Health check poll interval
    #[serde(default = "default_health_interval")]
    pub health_interval_secs: u64,

    /// Log tail size requested from the log endpoints
    #[serde(default = "default_log_lines")]
    pub log_lines: u32,
}

fn default_detail_interval() -> u64 {
    15
}

fn default_health_interval() -> u64 {
    30
}

fn default_log_lines() -> u32 {
    800
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            detail_interval_secs: default_detail_interval(),
            health_interval_secs: default_health_interval(),
            log_lines: default_log_lines(),
        }
    }
}

/// Default resource requests for new code servers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeServerDefaults {
    #[serde(default = "default_cpu_limit")]
    pub cpu_limit: String,

    #[serde(default = "default_memory_limit")]
    pub memory_limit: String,

    #[serde(default = "default_storage_size")]
    pub storage_size: String,
}

fn default_cpu_limit() -> String {
    "1000m".to_string()
}

fn default_memory_limit() -> String {
    "1024Mi".to_string()
}

fn default_storage_size() -> String {
    "5Gi".to_string()
}

impl Default for CodeServerDefaults {
    fn default() -> Self {
        Self {
            cpu_limit: default_cpu_limit(),
            memory_limit: default_memory_limit(),
            storage_size: default_storage_size(),
        }
    }
}

/// Get the data directory for vaultctl
pub fn get_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("vaultctl"))
        .unwrap_or_else(|| PathBuf::from(".vaultctl"))
}

/// Get the config directory for vaultctl
pub fn get_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("vaultctl"))
        .unwrap_or_else(get_data_dir)
}

/// Where the session credential is persisted
pub fn session_path() -> PathBuf {
    get_data_dir().join("session.json")
}

/// Load configuration from file or defaults
pub fn load_config() -> Config {
    let config_path = get_config_dir().join("config.toml");

    if config_path.exists() {
        if let Ok(contents) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str(&contents) {
                return config;
            }
            tracing::warn!("Ignoring unparseable config at {}", config_path.display());
        }
    }

    Config::default()
}

/// Save configuration to file
pub fn save_config(config: &Config) -> std::io::Result<()> {
    let config_dir = get_config_dir();
    std::fs::create_dir_all(&config_dir)?;

    let config_path = config_dir.join("config.toml");
    let contents = toml::to_string_pretty(config).unwrap_or_default();
    std::fs::write(config_path, contents)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.request_timeout_secs, 30);
        assert_eq!(config.polling.detail_interval_secs, 15);
        assert_eq!(config.polling.health_interval_secs, 30);
        assert_eq!(config.code_server.cpu_limit, "1000m");
        assert_eq!(config.code_server.memory_limit, "1024Mi");
        assert_eq!(config.code_server.storage_size, "5Gi");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [api]
            base_url = "https://vault.example/api"
            "#,
        )
        .unwrap();
        assert_eq!(config.api.base_url, "https://vault.example/api");
        assert_eq!(config.api.request_timeout_secs, 30);
        assert_eq!(config.polling.log_lines, 800);
    }

    #[test]
    fn test_round_trip() {
        let config = Config::default();
        let encoded = toml::to_string_pretty(&config).unwrap();
        let decoded: Config = toml::from_str(&encoded).unwrap();
        assert_eq!(decoded.api.base_url, config.api.base_url);
    }
}
