//! Process configuration read from the environment.

use std::env;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use roundindex_core::indexer::IndexerConfig;

use crate::logging::LogConfig;

pub const DEFAULT_SMARTBLOX_URL: &str = "http://localhost:8080";
pub const DEFAULT_DATABASE_PATH: &str = "./roundindex.db";

/// Everything the binary needs to wire up an index loop.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub smartblox_url: String,
    pub database_path: String,
    pub indexer: IndexerConfig,
    pub log: LogConfig,
}

impl AppConfig {
    /// Read the process environment, falling back to defaults for unset keys.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = IndexerConfig::default();

        let indexer = IndexerConfig {
            id: get("INDEXER_ID").unwrap_or(defaults.id),
            qualifying_kind: get("TX_TYPE").unwrap_or(defaults.qualifying_kind),
            poll_interval_ms: parse_or(get("POLL_INTERVAL_MS"), "POLL_INTERVAL_MS", defaults.poll_interval_ms)?,
            persist_cadence: parse_or(get("PERSIST_INTERVAL"), "PERSIST_INTERVAL", defaults.persist_cadence)?,
        };
        indexer.validate().context("invalid indexer configuration")?;

        let log = LogConfig {
            level: get("LOG_LEVEL").unwrap_or_else(|| LogConfig::default().level),
            json: parse_bool(get("LOG_JSON"), "LOG_JSON")?,
        };
        log.filter()?;

        Ok(Self {
            smartblox_url: get("SMARTBLOX_URL").unwrap_or_else(|| DEFAULT_SMARTBLOX_URL.into()),
            database_path: get("DATABASE_PATH").unwrap_or_else(|| DEFAULT_DATABASE_PATH.into()),
            indexer,
            log,
        })
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(v) => v
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a number, got {v:?}")),
        None => Ok(default),
    }
}

fn parse_bool(raw: Option<String>, key: &str) -> Result<bool> {
    let Some(v) = raw else {
        return Ok(false);
    };
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("{key} must be a boolean, got {v:?}"),
    }
}
