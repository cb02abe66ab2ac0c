//! Configuration Types
//!
//! All configuration structures with sensible defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::api::ApiClientConfig;
use crate::constants::{
    DEFAULT_LOOKBACK_DAYS, MAX_BACKFILL_WORKERS, RAW_BACKUP_RETENTION_DAYS,
};
use crate::summary::AiProviderConfig;
use crate::types::SelectionPolicy;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Upstream API client settings
    pub api: ApiClientConfig,

    /// Local storage settings
    pub storage: StorageConfig,

    /// Incremental sync settings
    pub sync: SyncConfig,

    /// Batch/backfill settings
    pub backfill: BackfillConfig,

    /// AI summarization settings
    pub ai: AiProviderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            api: ApiClientConfig::default(),
            storage: StorageConfig::default(),
            sync: SyncConfig::default(),
            backfill: BackfillConfig::default(),
            ai: AiProviderConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> crate::types::Result<()> {
        if self.api.timeout_secs == 0 {
            return Err(crate::types::SyncError::Config(
                "api.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.api.page_size == 0 {
            return Err(crate::types::SyncError::Config(
                "api.page_size must be greater than 0".to_string(),
            ));
        }
        if self.backfill.workers == 0 || self.backfill.workers > MAX_BACKFILL_WORKERS {
            return Err(crate::types::SyncError::Config(format!(
                "backfill.workers must be between 1 and {MAX_BACKFILL_WORKERS}, got {}",
                self.backfill.workers
            )));
        }
        if self.backfill.batch_size == 0 {
            return Err(crate::types::SyncError::Config(
                "backfill.batch_size must be greater than 0".to_string(),
            ));
        }
        if self.sync.lookback_days < 0 {
            return Err(crate::types::SyncError::Config(
                "sync.lookback_days must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Storage Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path
    pub db_path: PathBuf,

    /// Root of the raw response staging hierarchy
    pub raw_dir: PathBuf,

    /// Retention window for raw-store backups
    pub backup_retention_days: i64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("legisync.db"),
            raw_dir: PathBuf::from("raw"),
            backup_retention_days: RAW_BACKUP_RETENTION_DAYS,
        }
    }
}

// =============================================================================
// Sync Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Safety look-back window subtracted from the last successful
    /// watermark before an incremental fetch.
    pub lookback_days: i64,

    /// Policy for resolving multi-entry historical detail payloads.
    pub selection_policy: SelectionPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            selection_policy: SelectionPolicy::default(),
        }
    }
}

// =============================================================================
// Backfill Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackfillConfig {
    /// Entities per backfill batch
    pub batch_size: usize,

    /// Worker pool size; 1 degrades to strictly sequential processing
    /// under rate-limit pressure.
    pub workers: usize,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            workers: 4,
        }
    }
}
