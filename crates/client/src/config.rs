//! Client configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Bounds on every external call the bid pipeline makes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub prover_timeout_ms: u64,
    pub submit_timeout_ms: u64,
    pub confirmation_timeout_ms: u64,
    pub fetch_timeout_ms: u64,
    /// Attempts at fetching the inclusion proof before giving up
    pub fetch_attempts: u32,
    /// Base delay between fetch attempts, multiplied by the attempt number
    pub fetch_backoff_ms: u64,
    pub ledger_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            prover_timeout_ms: 120_000,
            submit_timeout_ms: 30_000,
            confirmation_timeout_ms: 300_000,
            fetch_timeout_ms: 10_000,
            fetch_attempts: 3,
            fetch_backoff_ms: 1_000,
            ledger_timeout_ms: 30_000,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch_attempts == 0 {
            return Err(ConfigError::Zero("fetch_attempts"));
        }
        Ok(())
    }

    pub fn prover_timeout(&self) -> Duration {
        Duration::from_millis(self.prover_timeout_ms)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn fetch_backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.fetch_backoff_ms.saturating_mul(attempt as u64))
    }

    pub fn ledger_timeout(&self) -> Duration {
        Duration::from_millis(self.ledger_timeout_ms)
    }
}

/// Top-level client settings, loadable from a JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Ledger JSON-RPC endpoint
    pub rpc_url: String,
    /// Proof-verification endpoint; the simulated network is used if unset
    pub verifier_url: Option<String>,
    /// Directory holding the bid secret store
    pub data_dir: PathBuf,
    pub pipeline: PipelineConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:9944".to_string(),
            verifier_url: None,
            data_dir: PathBuf::from(".zkbid"),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.pipeline.validate()?;
        Ok(config)
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.data_dir.join("secrets.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.fetch_attempts, 3);
        assert_eq!(config.fetch_backoff(2), Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        std::fs::write(
            &path,
            r#"{"rpc_url":"http://node:9944","pipeline":{"fetch_attempts":5}}"#,
        )
        .unwrap();

        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(config.rpc_url, "http://node:9944");
        assert_eq!(config.pipeline.fetch_attempts, 5);
        assert_eq!(config.pipeline.prover_timeout_ms, 120_000);
        assert_eq!(config.secrets_path(), PathBuf::from(".zkbid/secrets.json"));
    }

    #[test]
    fn test_load_rejects_zero_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        std::fs::write(&path, r#"{"pipeline":{"fetch_attempts":0}}"#).unwrap();
        assert!(matches!(
            ClientConfig::load(&path),
            Err(ConfigError::Zero("fetch_attempts"))
        ));
    }
}
