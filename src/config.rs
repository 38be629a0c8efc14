//! Configuration management
//! Load watcher settings from a TOML file, or from .env / environment variables

use crate::events::EventFilter;
use crate::pool::{moving_average_price_transformer, spot_price_transformer, PriceTransformer};
use crate::retry::{RetryOptions, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_INTERVAL_MS};
use crate::watcher::{WatcherOptions, DEFAULT_COMMITMENT_WINDOW_BUFFER};
use alloy::primitives::Address;
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

/// Oracle smoothing used by the simulation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceTransformerKind {
    #[default]
    MovingAverage,
    Spot,
}

impl PriceTransformerKind {
    pub fn transformer(&self) -> PriceTransformer {
        match self {
            PriceTransformerKind::MovingAverage => moving_average_price_transformer(),
            PriceTransformerKind::Spot => spot_price_transformer(),
        }
    }
}

impl FromStr for PriceTransformerKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "moving_average" | "sma" => Ok(PriceTransformerKind::MovingAverage),
            "spot" => Ok(PriceTransformerKind::Spot),
            other => bail!("unknown price transformer {:?} (moving_average | spot)", other),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatcherConfig {
    pub node_url: String,
    pub chain_id: u64,
    pub pool_addresses: Vec<String>,
    #[serde(default = "default_commitment_window_buffer")]
    pub commitment_window_buffer: u64,
    /// Event names to suppress, e.g. `["UPKEEP"]`
    #[serde(default)]
    pub ignore_events: Vec<String>,
    #[serde(default)]
    pub price_transformer: PriceTransformerKind,
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
}

fn default_commitment_window_buffer() -> u64 { DEFAULT_COMMITMENT_WINDOW_BUFFER }
fn default_retry_interval_ms() -> u64 { DEFAULT_RETRY_INTERVAL_MS }
fn default_retry_max_attempts() -> u32 { DEFAULT_MAX_ATTEMPTS }

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

impl WatcherConfig {
    /// Load configuration from a TOML file
    pub fn load_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }

    /// Load from the process environment, reading `.env` first if present
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| var(key).ok_or_else(|| anyhow!("{} not set", key));

        let mut config = WatcherConfig {
            node_url: required("NODE_URL")?,
            chain_id: required("CHAIN_ID")?
                .trim()
                .parse()
                .context("CHAIN_ID must be an integer")?,
            pool_addresses: split_list(&required("POOL_ADDRESSES")?),
            commitment_window_buffer: default_commitment_window_buffer(),
            ignore_events: Vec::new(),
            price_transformer: PriceTransformerKind::default(),
            retry_interval_ms: default_retry_interval_ms(),
            retry_max_attempts: default_retry_max_attempts(),
        };

        if let Some(buffer) = var("COMMITMENT_WINDOW_BUFFER") {
            config.commitment_window_buffer = buffer
                .trim()
                .parse()
                .context("COMMITMENT_WINDOW_BUFFER must be a number of seconds")?;
        }
        if let Some(ignore) = var("IGNORE_EVENTS") {
            config.ignore_events = split_list(&ignore);
        }
        if let Some(transformer) = var("PRICE_TRANSFORMER") {
            config.price_transformer = transformer.parse()?;
        }
        if let Some(interval) = var("RETRY_INTERVAL_MS") {
            config.retry_interval_ms = interval.trim().parse().context("RETRY_INTERVAL_MS")?;
        }
        if let Some(attempts) = var("RETRY_MAX_ATTEMPTS") {
            config.retry_max_attempts = attempts.trim().parse().context("RETRY_MAX_ATTEMPTS")?;
        }

        Ok(config)
    }

    pub fn pool_addresses(&self) -> Result<Vec<Address>> {
        if self.pool_addresses.is_empty() {
            bail!("no pool addresses configured");
        }
        self.pool_addresses
            .iter()
            .map(|raw| Address::from_str(raw.trim()).with_context(|| format!("invalid pool address {:?}", raw)))
            .collect()
    }

    pub fn watcher_options(&self) -> Result<WatcherOptions> {
        Ok(WatcherOptions {
            node_url: self.node_url.clone(),
            chain_id: self.chain_id,
            commitment_window_buffer: self.commitment_window_buffer,
            price_transformer: Some(self.price_transformer.transformer()),
            ignore_events: EventFilter::from_names(&self.ignore_events)?,
            retry: RetryOptions::new(self.retry_interval_ms, self.retry_max_attempts),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use std::collections::HashMap;

    const POOL: &str = "0x54114e9e1eEf979070091186D7102805819e916B";

    #[test]
    fn test_toml_with_defaults() {
        let config = WatcherConfig::from_toml_str(&format!(
            r#"
            node_url = "wss://arb-rinkeby.example/ws"
            chain_id = 421611
            pool_addresses = ["{}"]
            "#,
            POOL
        ))
        .unwrap();

        assert_eq!(config.commitment_window_buffer, 10);
        assert_eq!(config.retry_interval_ms, 1000);
        assert_eq!(config.retry_max_attempts, 3);
        assert_eq!(config.price_transformer, PriceTransformerKind::MovingAverage);
        assert_eq!(config.pool_addresses().unwrap().len(), 1);
    }

    #[test]
    fn test_toml_overrides() {
        let config = WatcherConfig::from_toml_str(&format!(
            r#"
            node_url = "http://localhost:8545"
            chain_id = 421611
            pool_addresses = ["{}"]
            commitment_window_buffer = 30
            ignore_events = ["UPKEEP", "COMMIT"]
            price_transformer = "spot"
            "#,
            POOL
        ))
        .unwrap();

        let options = config.watcher_options().unwrap();
        assert_eq!(options.commitment_window_buffer, 30);
        assert!(!options.ignore_events.is_enabled(EventKind::Upkeep));
        assert!(options.ignore_events.is_enabled(EventKind::CommitsExecuted));
    }

    #[test]
    fn test_env_vars() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("NODE_URL", "ws://localhost:8546"),
            ("CHAIN_ID", "421611"),
            ("POOL_ADDRESSES", " 0x54114e9e1eEf979070091186D7102805819e916B , "),
            ("IGNORE_EVENTS", "COMMITMENT_WINDOW_ENDED"),
            ("PRICE_TRANSFORMER", "SPOT"),
            ("RETRY_MAX_ATTEMPTS", "5"),
        ]);
        let config = WatcherConfig::from_vars(|key| vars.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.pool_addresses, vec![POOL.to_string()]);
        assert_eq!(config.price_transformer, PriceTransformerKind::Spot);
        assert_eq!(config.retry_max_attempts, 5);
        assert_eq!(config.ignore_events, vec!["COMMITMENT_WINDOW_ENDED".to_string()]);
    }

    #[test]
    fn test_missing_required_var() {
        let err = WatcherConfig::from_vars(|key| match key {
            "NODE_URL" => Some("ws://localhost:8546".to_string()),
            _ => None,
        })
        .unwrap_err();
        assert!(err.to_string().contains("CHAIN_ID"));
    }

    #[test]
    fn test_unknown_ignored_event_rejected() {
        let config = WatcherConfig {
            node_url: String::new(),
            chain_id: 421611,
            pool_addresses: vec![POOL.to_string()],
            commitment_window_buffer: 10,
            ignore_events: vec!["LIQUIDATION".to_string()],
            price_transformer: PriceTransformerKind::Spot,
            retry_interval_ms: 1000,
            retry_max_attempts: 3,
        };
        assert!(config.watcher_options().is_err());
    }

    #[test]
    fn test_invalid_address() {
        let config = WatcherConfig::from_toml_str(
            r#"
            node_url = "ws://localhost:8546"
            chain_id = 421611
            pool_addresses = ["0x1234"]
            "#,
        )
        .unwrap();
        assert!(config.pool_addresses().is_err());
    }
}
