//! Configuration for the XSI monitor

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, Result};

/// Event package the monitor subscribes to by default
pub const DEFAULT_EVENT_PACKAGE: &str = "Call Center Agent";

/// Delay between two processed events
pub const DEFAULT_PACING_MS: u64 = 500;

/// Registry size above which a warning is logged
pub const DEFAULT_REGISTRY_HIGH_WATER: usize = 10_000;

/// Extension blocked callers are parked on
pub const DEFAULT_BLOCK_DESTINATION: &str = "8889";

/// Monitor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// XSI event package to subscribe to
    pub event_package: String,
    /// Throttle applied after each event, in milliseconds
    pub pacing_ms: u64,
    /// Registry size that triggers a growth warning
    pub registry_high_water: usize,
    /// Call routing rules
    pub routing: RoutingConfig,
}

/// Call routing rules applied to call-added events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Caller numbers that get diverted instead of registered
    pub blocked_callers: Vec<String>,
    /// Where blocked callers are transferred
    pub block_destination: String,
}

impl MonitorConfig {
    /// Pacing delay as a duration
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    /// Set the pacing delay
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing_ms = pacing.as_millis() as u64;
        self
    }

    /// Set the event package
    pub fn with_event_package(mut self, package: impl Into<String>) -> Self {
        self.event_package = package.into();
        self
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.event_package.trim().is_empty() {
            return Err(MonitorError::config("event_package must not be empty"));
        }
        if !self.routing.blocked_callers.is_empty() && self.routing.block_destination.is_empty() {
            return Err(MonitorError::config(
                "routing.block_destination is required when blocked_callers is set",
            ));
        }
        Ok(())
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            event_package: DEFAULT_EVENT_PACKAGE.to_string(),
            pacing_ms: DEFAULT_PACING_MS,
            registry_high_water: DEFAULT_REGISTRY_HIGH_WATER,
            routing: RoutingConfig::default(),
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            blocked_callers: Vec::new(),
            block_destination: DEFAULT_BLOCK_DESTINATION.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.event_package, "Call Center Agent");
        assert_eq!(config.pacing(), Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_deserialize_fills_defaults() {
        let config: MonitorConfig = serde_json::from_str(r#"{"pacing_ms": 0}"#).unwrap();
        assert_eq!(config.pacing_ms, 0);
        assert_eq!(config.event_package, DEFAULT_EVENT_PACKAGE);
        assert_eq!(config.routing.block_destination, DEFAULT_BLOCK_DESTINATION);
    }

    #[test]
    fn test_validate_rejects_blank_package() {
        let config = MonitorConfig::default().with_event_package("  ");
        assert!(matches!(
            config.validate(),
            Err(MonitorError::Configuration { .. })
        ));
    }
}
