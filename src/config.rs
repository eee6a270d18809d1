//! Reader configuration
//!
//! Loaded from a JSON file. Every field has a default, so an empty object
//! (or no file at all) gives a working local setup.
//!
//! # Example file:
//! ```json
//! {
//!   "node_url": "https://eth.example.org",
//!   "trace_flavor": "geth",
//!   "confirmation_depth": 64,
//!   "failure": { "kind": "reverted", "message": "execution reverted" }
//! }
//! ```

use crate::reconcile::FailurePolicy;
use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Deserialize;
use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;

/// Which trace endpoint the node exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TraceFlavor {
    /// `trace_transaction` (OpenEthereum, Erigon, Nethermind)
    #[default]
    Parity,
    /// `debug_traceTransaction` with the `callTracer`
    Geth,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub node_url: String,
    pub trace_flavor: TraceFlavor,
    /// Blocks behind the head considered irreversible
    pub confirmation_depth: u64,
    pub asset_cache_capacity: usize,
    /// Attempts per retried call (receipt, trace, logs)
    pub retry_attempts: u32,
    /// Transactions enriched concurrently
    pub enrichment_concurrency: usize,
    pub failure: FailurePolicy,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            node_url: "http://127.0.0.1:8545".to_string(),
            trace_flavor: TraceFlavor::Parity,
            confirmation_depth: 30,
            asset_cache_capacity: 100_000,
            retry_attempts: 3,
            enrichment_concurrency: 16,
            failure: FailurePolicy::default(),
        }
    }
}

impl ReaderConfig {
    /// Reject values the reader cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.node_url.trim().is_empty() {
            anyhow::bail!("node_url must not be empty");
        }
        if self.asset_cache_capacity == 0 {
            anyhow::bail!("asset_cache_capacity must be at least 1");
        }
        if self.retry_attempts == 0 {
            anyhow::bail!("retry_attempts must be at least 1");
        }
        if self.enrichment_concurrency == 0 {
            anyhow::bail!("enrichment_concurrency must be at least 1");
        }
        Ok(())
    }

    pub fn cache_capacity(&self) -> Result<NonZeroUsize> {
        NonZeroUsize::new(self.asset_cache_capacity)
            .context("asset_cache_capacity must be at least 1")
    }
}

/// Load and validate a configuration file.
pub fn load_config(path: &Path) -> Result<ReaderConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: ReaderConfig = serde_json::from_str(&contents)
        .with_context(|| format!("Invalid config file: {:?}", path))?;

    config
        .validate()
        .with_context(|| format!("Invalid config file: {:?}", path))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TransactionErrorKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{
                "node_url": "https://eth.example.org",
                "trace_flavor": "geth",
                "confirmation_depth": 64,
                "failure": {{ "kind": "reverted" }}
            }}"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.node_url, "https://eth.example.org");
        assert_eq!(config.trace_flavor, TraceFlavor::Geth);
        assert_eq!(config.confirmation_depth, 64);
        assert_eq!(config.failure.kind, TransactionErrorKind::Reverted);
        // unspecified fields keep their defaults
        assert_eq!(config.failure.message, "transaction failed");
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.asset_cache_capacity, 100_000);
    }

    #[test]
    fn test_empty_object_is_default() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{}}").unwrap();
        file.flush().unwrap();

        assert_eq!(load_config(file.path()).unwrap(), ReaderConfig::default());
    }

    #[test]
    fn test_load_config_rejects_zero_values() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{ "retry_attempts": 0 }}"#).unwrap();
        file.flush().unwrap();

        let err = load_config(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("retry_attempts"));
    }

    #[test]
    fn test_validate() {
        assert!(ReaderConfig::default().validate().is_ok());

        let config = ReaderConfig {
            enrichment_concurrency: 0,
            ..ReaderConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ReaderConfig {
            asset_cache_capacity: 0,
            ..ReaderConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(config.cache_capacity().is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(load_config(Path::new("/nonexistent/ethreader.json")).is_err());
    }
}
