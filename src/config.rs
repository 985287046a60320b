//! Engine configuration
//!
//! Everything the engine needs is resolved by the caller and passed in through
//! [`MnemonicConfig`]. Environment variables and CLI flags are handled by the
//! binaries, never here.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{MnemonicError, Result};
use crate::types::StorageMode;

/// File name of the database inside the data directory
pub const DB_FILE_NAME: &str = "memories.db";
/// Default page size for list/search
pub const DEFAULT_LIMIT: usize = 20;
/// Hard cap on page size
pub const MAX_LIMIT: usize = 100;

/// Relative contribution of text relevance and effective weight to the search score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingWeights {
    /// w1: normalized full-text relevance
    pub relevance: f64,
    /// w2: effective weight
    pub weight: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            relevance: 0.6,
            weight: 0.4,
        }
    }
}

impl RankingWeights {
    pub fn validate(&self) -> Result<()> {
        let in_range = |w: f64| w.is_finite() && (0.0..=1.0).contains(&w);
        if !in_range(self.relevance) || !in_range(self.weight) {
            return Err(MnemonicError::Config(
                "ranking weights must be within [0, 1]".to_string(),
            ));
        }
        if (self.relevance + self.weight - 1.0).abs() > 1e-9 {
            return Err(MnemonicError::Config(format!(
                "ranking weights must sum to 1 (got {} + {})",
                self.relevance, self.weight
            )));
        }
        Ok(())
    }
}

/// Configuration for a Mnemonic store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MnemonicConfig {
    /// Path to the SQLite file, or ":memory:"
    pub db_path: String,
    #[serde(default)]
    pub storage_mode: StorageMode,
    /// How long a statement waits on a locked database before failing
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default)]
    pub ranking: RankingWeights,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "max_limit")]
    pub max_limit: usize,
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

fn max_limit() -> usize {
    MAX_LIMIT
}

impl MnemonicConfig {
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            storage_mode: StorageMode::Local,
            busy_timeout_ms: default_busy_timeout_ms(),
            ranking: RankingWeights::default(),
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
        }
    }

    /// In-memory database, for tests and benchmarks
    pub fn in_memory() -> Self {
        Self::new(":memory:")
    }

    pub fn validate(&self) -> Result<()> {
        if self.db_path.trim().is_empty() {
            return Err(MnemonicError::Config("db_path is empty".to_string()));
        }
        if self.default_limit == 0 || self.max_limit == 0 {
            return Err(MnemonicError::Config(
                "page limits must be positive".to_string(),
            ));
        }
        if self.default_limit > self.max_limit {
            return Err(MnemonicError::Config(format!(
                "default_limit {} exceeds max_limit {}",
                self.default_limit, self.max_limit
            )));
        }
        self.ranking.validate()
    }

    /// Resolve a requested page size against the configured default and cap
    pub fn page_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit)
    }
}

/// Default data directory: `~/.mnemonic`
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mnemonic")
}

/// Database path inside `data_dir` (or the default data directory)
pub fn db_path_in(data_dir: Option<&str>) -> String {
    let dir = match data_dir {
        Some(dir) => PathBuf::from(shellexpand::tilde(dir).to_string()),
        None => default_data_dir(),
    };
    dir.join(DB_FILE_NAME).to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        MnemonicConfig::in_memory().validate().unwrap();
    }

    #[test]
    fn test_ranking_weights_must_sum_to_one() {
        let mut config = MnemonicConfig::in_memory();
        config.ranking = RankingWeights {
            relevance: 0.7,
            weight: 0.7,
        };
        assert!(matches!(config.validate(), Err(MnemonicError::Config(_))));
    }

    #[test]
    fn test_page_limit_clamps() {
        let config = MnemonicConfig::in_memory();
        assert_eq!(config.page_limit(None), DEFAULT_LIMIT);
        assert_eq!(config.page_limit(Some(0)), 1);
        assert_eq!(config.page_limit(Some(1000)), MAX_LIMIT);
    }

    #[test]
    fn test_db_path_in_data_dir() {
        let path = db_path_in(Some("/tmp/mnemonic-data"));
        assert!(path.ends_with("memories.db"));
        assert!(path.starts_with("/tmp/mnemonic-data"));
    }
}
