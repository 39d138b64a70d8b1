//! Tracing subscriber setup for the monitor service
//!
//! Driven by the `[logging]` section of [`ServerConfig`](crate::ServerConfig),
//! e.g. `XSI_MONITOR_LOGGING__SPANS=true` traces each processed event's span.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{Result, ServerError};

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Base level; `RUST_LOG` directives refine it
    pub level: String,
    /// Emit JSON lines instead of the human format
    pub json: bool,
    /// Include source file and line
    pub file_info: bool,
    /// Log span enter/exit, one `xsi_event` span per processed event
    pub spans: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file_info: false,
            spans: false,
        }
    }
}

impl LogSettings {
    pub fn level(&self) -> Result<Level> {
        parse_log_level(&self.level)
    }

    fn span_events(&self) -> FmtSpan {
        if self.spans {
            FmtSpan::ACTIVE
        } else {
            FmtSpan::NONE
        }
    }
}

/// Install the global subscriber
pub fn setup_logging(settings: &LogSettings) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive(settings.level()?.into());

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_span_events(settings.span_events())
        .with_file(settings.file_info)
        .with_line_number(settings.file_info);

    let installed = if settings.json {
        builder.with_writer(std::io::stdout).json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| ServerError::Logging(e.to_string()))
}

pub fn parse_log_level(level: &str) -> Result<Level> {
    Level::from_str(level)
        .map_err(|_| ServerError::Logging(format!("Invalid log level: {}", level)))
}

pub fn log_welcome(app_name: &str, version: &str) {
    tracing::info!("Starting {} v{}", app_name, version);
}
