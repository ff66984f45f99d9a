//! Typed run configuration.
//!
//! Layered from lowest to highest precedence: built-in defaults, an optional
//! TOML file, then environment variables. The binary applies its CLI flags
//! on top and calls [`Config::validate`] before running.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::queue::DEFAULT_QUEUE_NAME;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Number of producer threads.
    pub producers: usize,
    /// Number of consumer threads.
    pub consumers: usize,
    /// Items pushed by each producer.
    pub items_per_producer: u64,
    /// Queue label used in logs and metrics.
    pub queue_name: String,
    pub log_level: String,
    pub otel_endpoint: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            producers: 1,
            consumers: 1,
            items_per_producer: 10,
            queue_name: DEFAULT_QUEUE_NAME.to_string(),
            log_level: "info".to_string(),
            otel_endpoint: None,
        }
    }
}

impl Config {
    /// Defaults overridden by environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env()
    }

    /// Read a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str::<Self>(&content)
            .map_err(|e| Error::Config(format!("bad config file {}: {e}", path.display())))?
            .with_env()
    }

    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Apply `SIMPLEQ_*`, `LOG_LEVEL` and `OTEL_ENDPOINT` overrides.
    pub fn with_env(mut self) -> Result<Self> {
        if let Some(n) = parsed_var("SIMPLEQ_PRODUCERS")? {
            self.producers = n;
        }
        if let Some(n) = parsed_var("SIMPLEQ_CONSUMERS")? {
            self.consumers = n;
        }
        if let Some(n) = parsed_var("SIMPLEQ_ITEMS")? {
            self.items_per_producer = n;
        }
        if let Ok(name) = std::env::var("SIMPLEQ_QUEUE") {
            self.queue_name = name;
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.log_level = level;
        }
        if let Ok(endpoint) = std::env::var("OTEL_ENDPOINT") {
            self.otel_endpoint = Some(endpoint);
        }
        Ok(self)
    }

    /// Reject shapes that could never finish a run.
    pub fn validate(&self) -> Result<()> {
        if self.producers == 0 {
            return Err(Error::Config("at least one producer is required".to_string()));
        }
        if self.consumers == 0 {
            return Err(Error::Config("at least one consumer is required".to_string()));
        }
        if (self.producers as u64)
            .checked_mul(self.items_per_producer)
            .is_none()
        {
            return Err(Error::Config(format!(
                "{} producers x {} items overflows the item range",
                self.producers, self.items_per_producer
            )));
        }
        Ok(())
    }

    /// Total number of items a run will push. Saturates for shapes that
    /// [`validate`](Self::validate) rejects.
    pub fn total_items(&self) -> u64 {
        (self.producers as u64).saturating_mul(self.items_per_producer)
    }
}

fn parsed_var<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("{name}={raw:?} is not valid: {e}"))),
        Err(_) => Ok(None),
    }
}
