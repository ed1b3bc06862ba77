//! Document format version gate
//!
//! Pure decision logic; executing migrations is the store's job.

use crate::errors::{Result, WireTunerError};

/// Format version written by this build
pub const CURRENT_FORMAT_VERSION: i64 = 3;

/// Oldest format this build can migrate from
pub const MIN_FORMAT_VERSION: i64 = 1;

/// Outcome of comparing a stored format version against this build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionStatus {
    /// Equal to the current version
    Supported,
    /// Older; the listed single steps must run in order
    NeedsMigration { from: i64, to: i64 },
    /// Newer than this build
    Unsupported { found: i64 },
}

impl VersionStatus {
    /// Classify a stored version
    ///
    /// # Errors
    ///
    /// Returns `WireTunerError::InvalidFormatVersion` for versions below 1.
    pub fn check(stored: i64) -> Result<Self> {
        Self::check_against(stored, CURRENT_FORMAT_VERSION)
    }

    /// # Errors
    ///
    /// Returns `WireTunerError::InvalidFormatVersion` for versions below 1.
    pub fn check_against(stored: i64, current: i64) -> Result<Self> {
        if stored < MIN_FORMAT_VERSION {
            return Err(WireTunerError::InvalidFormatVersion { version: stored });
        }
        Ok(match stored.cmp(&current) {
            std::cmp::Ordering::Equal => VersionStatus::Supported,
            std::cmp::Ordering::Less => VersionStatus::NeedsMigration {
                from: stored,
                to: current,
            },
            std::cmp::Ordering::Greater => VersionStatus::Unsupported { found: stored },
        })
    }

    /// Turn `Unsupported` into the fatal error callers surface
    ///
    /// # Errors
    ///
    /// Returns `WireTunerError::SchemaTooNew` when the version is too new.
    pub fn require_readable(self) -> Result<Self> {
        match self {
            VersionStatus::Unsupported { found } => Err(WireTunerError::SchemaTooNew {
                found,
                supported: CURRENT_FORMAT_VERSION,
            }),
            other => Ok(other),
        }
    }

    /// Single-step hops `(from, to)` needed to reach the current version
    pub fn steps(&self) -> Vec<(i64, i64)> {
        match self {
            VersionStatus::NeedsMigration { from, to } => {
                (*from..*to).map(|v| (v, v + 1)).collect()
            }
            _ => Vec::new(),
        }
    }
}
