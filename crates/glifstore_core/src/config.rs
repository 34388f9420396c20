//! Store configuration.
//!
//! # Responsibility
//! - Hold policy knobs for lock staleness and status transitions.
//! - Load overrides from a TOML file; every field has a default.
//!
//! # Example
//! ```toml
//! lock_ttl_secs = 7200
//! transition_policy = "sequential"
//! ```

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Locks older than this are considered abandoned.
pub const DEFAULT_LOCK_TTL_SECS: u64 = 60 * 60;

/// Forward status transition rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPolicy {
    /// Any higher review tier may be reached directly.
    #[default]
    AllowSkip,
    /// Only the next review tier may be reached.
    Sequential,
}

/// Runtime policy for glif services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Lock staleness window in seconds. `0` disables expiry.
    pub lock_ttl_secs: u64,
    pub transition_policy: TransitionPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_ttl_secs: DEFAULT_LOCK_TTL_SECS,
            transition_policy: TransitionPolicy::default(),
        }
    }
}

/// Errors from configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: Option<PathBuf>,
        message: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read config file `{}`: {source}", path.display())
            }
            Self::Parse {
                path: Some(path),
                message,
            } => write!(f, "failed to parse config file `{}`: {message}", path.display()),
            Self::Parse {
                path: None,
                message,
            } => write!(f, "failed to parse config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse { .. } => None,
        }
    }
}

impl StoreConfig {
    /// Parses TOML text; missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|err| ConfigError::Parse {
            path: None,
            message: err.to_string(),
        })
    }

    /// Loads a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|err| ConfigError::Parse {
            path: Some(path.to_path_buf()),
            message: err.to_string(),
        })
    }

    /// Staleness window in epoch ms, `None` when locks never expire.
    pub fn lock_ttl_ms(&self) -> Option<i64> {
        if self.lock_ttl_secs == 0 {
            return None;
        }
        Some(i64::try_from(self.lock_ttl_secs.saturating_mul(1000)).unwrap_or(i64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::{StoreConfig, TransitionPolicy, DEFAULT_LOCK_TTL_SECS};

    #[test]
    fn empty_toml_yields_defaults() {
        let config = StoreConfig::from_toml_str("").unwrap();
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.lock_ttl_secs, DEFAULT_LOCK_TTL_SECS);
        assert_eq!(config.transition_policy, TransitionPolicy::AllowSkip);
    }

    #[test]
    fn parses_overrides() {
        let config = StoreConfig::from_toml_str(
            "lock_ttl_secs = 0\ntransition_policy = \"sequential\"\n",
        )
        .unwrap();
        assert_eq!(config.lock_ttl_ms(), None);
        assert_eq!(config.transition_policy, TransitionPolicy::Sequential);
    }

    #[test]
    fn rejects_unknown_policy() {
        let err = StoreConfig::from_toml_str("transition_policy = \"strict\"").unwrap_err();
        assert!(err.to_string().contains("failed to parse config"));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("glifstore.toml");
        std::fs::write(&path, "lock_ttl_secs = 90\n").unwrap();
        let config = StoreConfig::load(&path).unwrap();
        assert_eq!(config.lock_ttl_ms(), Some(90_000));
    }
}
