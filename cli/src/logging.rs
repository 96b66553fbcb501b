//! Tracing subscriber setup.

use anyhow::{Context, Result};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output settings.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// `EnvFilter` directives: a bare level ("debug") or per-crate
    /// overrides ("info,roundindex_smartblox=trace").
    pub level: String,
    /// JSON lines instead of human-readable text
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

impl LogConfig {
    /// Parse `level` into a filter. Fails on malformed directives; a
    /// directive without `=` must be a plain level.
    pub fn filter(&self) -> Result<EnvFilter> {
        for directive in self.level.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            if !directive.contains('=') && !directive.contains('[') {
                directive
                    .parse::<LevelFilter>()
                    .with_context(|| format!("LOG_LEVEL has an unknown level {directive:?}"))?;
            }
        }
        EnvFilter::try_new(&self.level)
            .with_context(|| format!("LOG_LEVEL is not a valid filter, got {:?}", self.level))
    }
}

/// Install the global subscriber. Call once at startup.
pub fn init_tracing(config: &LogConfig) -> Result<()> {
    let filter = config.filter()?;

    if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
    Ok(())
}
