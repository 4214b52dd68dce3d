// =============================================================================
// Service Configuration: JSON file + environment overrides
// =============================================================================
//
// Every field carries a serde default so that a partial (or absent) config
// file still yields a usable configuration.  Environment variables override
// the file; `DATABASE_URL` is the single connection string the deployment is
// expected to supply.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "analyst_config.json";

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_ticker() -> String {
    "META".to_string()
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_database_url() -> String {
    "sqlite://historical_data.db".to_string()
}

fn default_provider_url() -> String {
    "https://query2.finance.yahoo.com".to_string()
}

fn default_pool_size() -> u32 {
    4
}

// =============================================================================
// AnalystConfig
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalystConfig {
    /// The single ticker this deployment serves.
    #[serde(default = "default_ticker")]
    pub ticker: String,

    /// Socket address for the HTTP server.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// `sqlite://path` or a bare file path.
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Base URL of the Yahoo Finance chart API.
    #[serde(default = "default_provider_url")]
    pub provider_url: String,

    /// Maximum pooled database connections.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

impl Default for AnalystConfig {
    fn default() -> Self {
        Self {
            ticker: default_ticker(),
            bind_addr: default_bind_addr(),
            database_url: default_database_url(),
            provider_url: default_provider_url(),
            pool_size: default_pool_size(),
        }
    }
}

impl AnalystConfig {
    /// Load configuration from a JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;

        info!(path = %path.display(), ticker = %config.ticker, "config loaded");
        Ok(config)
    }

    /// File (if present) then environment, falling back to defaults.
    pub fn from_env() -> Self {
        let path = std::env::var("ANALYST_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());

        let mut config = if Path::new(&path).exists() {
            Self::load(&path).unwrap_or_else(|e| {
                warn!(error = %e, "Failed to load config, using defaults");
                Self::default()
            })
        } else {
            Self::default()
        };

        config.apply_overrides(|name| std::env::var(name).ok());
        config
    }

    /// Apply `ANALYST_*` / `DATABASE_URL` overrides from `lookup`.
    ///
    /// Blank values are ignored; an unparseable pool size keeps the current
    /// value. The ticker is always normalised to upper case.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| {
            lookup(name)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        if let Some(url) = var("DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(ticker) = var("ANALYST_TICKER") {
            self.ticker = ticker;
        }
        if let Some(addr) = var("ANALYST_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(url) = var("ANALYST_PROVIDER_URL") {
            self.provider_url = url;
        }
        if let Some(size) = var("ANALYST_POOL_SIZE") {
            match size.parse::<u32>() {
                Ok(n) if n > 0 => self.pool_size = n,
                _ => warn!(value = %size, "ignoring invalid ANALYST_POOL_SIZE"),
            }
        }

        self.ticker = self.ticker.trim().to_uppercase();
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = AnalystConfig::default();
        assert_eq!(cfg.ticker, "META");
        assert_eq!(cfg.bind_addr, "0.0.0.0:8000");
        assert_eq!(cfg.database_url, "sqlite://historical_data.db");
        assert_eq!(cfg.pool_size, 4);
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: AnalystConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, AnalystConfig::default());
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "ticker": "ACME", "pool_size": 8 }"#;
        let cfg: AnalystConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.ticker, "ACME");
        assert_eq!(cfg.pool_size, 8);
        assert_eq!(cfg.bind_addr, "0.0.0.0:8000");
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        std::fs::write(&path, r#"{ "database_url": "sqlite://x.db" }"#).unwrap();
        let cfg = AnalystConfig::load(&path).unwrap();
        assert_eq!(cfg.database_url, "sqlite://x.db");
    }

    #[test]
    fn load_missing_file_is_error() {
        assert!(AnalystConfig::load("/definitely/not/here.json").is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("DATABASE_URL", "sqlite:///tmp/prices.db"),
            ("ANALYST_TICKER", "acme"),
            ("ANALYST_BIND_ADDR", "127.0.0.1:9000"),
            ("ANALYST_POOL_SIZE", "not-a-number"),
            ("ANALYST_PROVIDER_URL", "   "),
        ]);
        let mut cfg = AnalystConfig::default();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.database_url, "sqlite:///tmp/prices.db");
        assert_eq!(cfg.ticker, "ACME");
        assert_eq!(cfg.bind_addr, "127.0.0.1:9000");
        assert_eq!(cfg.pool_size, 4);
        assert_eq!(cfg.provider_url, "https://query2.finance.yahoo.com");
    }
}
