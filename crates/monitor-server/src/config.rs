//! Service configuration
//!
//! Layered: built-in defaults, then an optional TOML file, then environment
//! variables such as `XSI_MONITOR_BIND_ADDRESS` or
//! `XSI_MONITOR_MONITOR__PACING_MS` (`__` separates nested keys).

use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use xsi_monitor_core::MonitorConfig;

use crate::error::Result;
use crate::logging::LogSettings;

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8090";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://xsi-monitor.db?mode=rwc";
pub const ENV_PREFIX: &str = "XSI_MONITOR";

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub database_url: String,
    /// Start monitoring as soon as the service is up
    pub autostart: bool,
    pub monitor: MonitorConfig,
    pub logging: LogSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            autostart: true,
            monitor: MonitorConfig::default(),
            logging: LogSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Load defaults, then `path` (if given), then the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Self>()?;
        config.monitor.validate()?;
        Ok(config)
    }

    /// Load from the environment only
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::time::Duration;

    fn clear_env() {
        for key in [
            "XSI_MONITOR_BIND_ADDRESS",
            "XSI_MONITOR_AUTOSTART",
            "XSI_MONITOR_MONITOR__PACING_MS",
            "XSI_MONITOR_LOGGING__SPANS",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_without_sources() {
        clear_env();
        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.monitor.pacing(), Duration::from_millis(500));
    }

    #[test]
    #[serial]
    fn test_environment_overrides() {
        clear_env();
        std::env::set_var("XSI_MONITOR_BIND_ADDRESS", "0.0.0.0:9000");
        std::env::set_var("XSI_MONITOR_AUTOSTART", "false");
        std::env::set_var("XSI_MONITOR_MONITOR__PACING_MS", "50");
        std::env::set_var("XSI_MONITOR_LOGGING__SPANS", "true");

        let config = ServerConfig::from_env();
        clear_env();
        let config = config.unwrap();

        assert_eq!(config.bind_address, "0.0.0.0:9000");
        assert!(!config.autostart);
        assert_eq!(config.monitor.pacing_ms, 50);
        assert_eq!(config.monitor.event_package, "Call Center Agent");
        assert!(config.logging.spans);
        assert!(!config.logging.file_info);
    }

    #[test]
    #[serial]
    fn test_file_source() {
        clear_env();
        let path = std::env::temp_dir().join(format!("xsi-monitor-{}.toml", uuid::Uuid::new_v4()));
        let toml = r#"
[logging]
level = "debug"
file_info = true

[monitor]
event_package = "Advanced Call"

[monitor.routing]
blocked_callers = ["+15550001111"]
"#;
        std::fs::write(&path, toml).unwrap();

        let config = ServerConfig::load(Some(&path));
        let _ = std::fs::remove_file(&path);
        let config = config.unwrap();

        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.file_info);
        assert!(!config.logging.json);
        assert_eq!(config.monitor.event_package, "Advanced Call");
        assert_eq!(config.monitor.routing.blocked_callers, vec!["+15550001111"]);
        assert_eq!(config.monitor.routing.block_destination, "8889");
    }

    #[test]
    #[serial]
    fn test_missing_file_is_an_error() {
        clear_env();
        assert!(ServerConfig::load(Some(Path::new("/nonexistent/xsi-monitor.toml"))).is_err());
    }
}
