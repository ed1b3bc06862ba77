//! Persistence tunables
//!
//! Every section has defaults, so an empty TOML document is a valid config.
//!
//! ```
//! use wiretuner_core::config::PersistenceConfig;
//!
//! let config = PersistenceConfig::from_toml_str(
//!     r#"
//!     [snapshot]
//!     event_threshold = 500
//!
//!     [checkpoints]
//!     byte_budget = 1048576
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(config.snapshot.event_threshold, 500);
//! assert_eq!(config.autosave.idle_ms, 200);
//! ```

use crate::errors::{Result, WireTunerError};
use crate::snapshot::frame::Compression;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Events since the last snapshot that trigger a new one
    pub event_threshold: u64,
    /// Seconds since the last snapshot that trigger a new one
    pub elapsed_threshold_secs: u64,
    pub compression: Compression,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            event_threshold: 1000,
            elapsed_threshold_secs: 600,
            compression: Compression::Gzip,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosaveConfig {
    pub idle_ms: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self { idle_ms: 200 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Replay stores a checkpoint at every multiple of this sequence
    pub interval: u64,
    pub max_entries: usize,
    pub byte_budget: usize,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            interval: 1000,
            max_entries: 32,
            byte_budget: 64 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Delay before each retry of a contended write
    pub backoff_ms: Vec<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            backoff_ms: vec![10, 50, 200],
        }
    }
}

impl RetryConfig {
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        self.backoff_ms.iter().map(|ms| Duration::from_millis(*ms))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Return a partial document when an event is corrupted mid-log
    pub accept_partial: bool,
    /// Continue past missing sequences instead of failing the load
    pub accept_gaps: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            accept_partial: true,
            accept_gaps: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub snapshot: SnapshotConfig,
    pub autosave: AutosaveConfig,
    pub checkpoints: CheckpointConfig,
    pub retry: RetryConfig,
    pub recovery: RecoveryConfig,
}

impl PersistenceConfig {
    /// Parse and validate a TOML document
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for unparsable or out-of-range values.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: PersistenceConfig =
            toml::from_str(input).map_err(|e| WireTunerError::InvalidConfig {
                field: "<document>".to_string(),
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    ///
    /// Returns `ConfigIo` if the file cannot be read, otherwise as
    /// `from_toml_str`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|e| WireTunerError::ConfigIo {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&input)
    }

    /// # Errors
    ///
    /// Returns `InvalidConfig` naming the first zero threshold or interval.
    pub fn validate(&self) -> Result<()> {
        let checks: [(&str, bool); 5] = [
            ("snapshot.event_threshold", self.snapshot.event_threshold > 0),
            (
                "snapshot.elapsed_threshold_secs",
                self.snapshot.elapsed_threshold_secs > 0,
            ),
            ("autosave.idle_ms", self.autosave.idle_ms > 0),
            ("checkpoints.interval", self.checkpoints.interval > 0),
            ("checkpoints.byte_budget", self.checkpoints.byte_budget > 0),
        ];

        match checks.iter().find(|(_, ok)| !ok) {
            Some((field, _)) => Err(WireTunerError::InvalidConfig {
                field: field.to_string(),
                reason: "must be greater than zero".to_string(),
            }),
            None => Ok(()),
        }
    }

    pub fn elapsed_threshold(&self) -> Duration {
        Duration::from_secs(self.snapshot.elapsed_threshold_secs)
    }

    pub fn idle_window(&self) -> Duration {
        Duration::from_millis(self.autosave.idle_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = PersistenceConfig::default();
        assert_eq!(config.snapshot.event_threshold, 1000);
        assert_eq!(config.elapsed_threshold(), Duration::from_secs(600));
        assert_eq!(config.snapshot.compression, Compression::Gzip);
        assert_eq!(config.idle_window(), Duration::from_millis(200));
        assert_eq!(config.checkpoints.interval, 1000);
        assert_eq!(config.retry.backoff_ms, vec![10, 50, 200]);
        assert!(config.recovery.accept_partial);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(
            PersistenceConfig::from_toml_str("").unwrap(),
            PersistenceConfig::default()
        );
    }

    #[test]
    fn test_compression_none_parses() {
        let config = PersistenceConfig::from_toml_str("[snapshot]\ncompression = \"none\"").unwrap();
        assert_eq!(config.snapshot.compression, Compression::None);
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let err = PersistenceConfig::from_toml_str("[snapshot]\nevent_threshold = 0").unwrap_err();
        match err {
            WireTunerError::InvalidConfig { field, .. } => {
                assert_eq!(field, "snapshot.event_threshold")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_compression_rejected() {
        assert!(PersistenceConfig::from_toml_str("[snapshot]\ncompression = \"lz4\"").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[autosave]\nidle_ms = 50").unwrap();

        let config = PersistenceConfig::load(file.path()).unwrap();
        assert_eq!(config.autosave.idle_ms, 50);
    }

    #[test]
    fn test_load_missing_file() {
        let err = PersistenceConfig::load("/nonexistent/wiretuner.toml").unwrap_err();
        assert!(matches!(err, WireTunerError::ConfigIo { .. }));
    }
}
