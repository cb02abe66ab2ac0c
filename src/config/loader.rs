//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/legisync/config.toml)
//! 3. Project config (legisync.toml)
//! 4. Environment variables (LEGISYNC_* prefix)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use tracing::{debug, info};

use super::types::Config;
use crate::types::{Result, SyncError};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        let project_path = Self::project_config_path();
        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(&project_path));
        }

        // e.g. LEGISYNC_API_TIMEOUT_SECS -> api.timeout_secs
        figment = figment.merge(Env::prefixed("LEGISYNC_").split("_").lowercase(true));

        let config: Config = figment
            .extract()
            .map_err(|e| SyncError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file only (plus defaults).
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| SyncError::Config(format!("Configuration error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Path to the global config file, platform-resolved.
    pub fn global_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "legisync").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Path to the project config file.
    pub fn project_config_path() -> PathBuf {
        PathBuf::from("legisync.toml")
    }

    /// Write a default project config, refusing to clobber an existing
    /// one unless forced.
    pub fn init_project(force: bool) -> Result<PathBuf> {
        let path = Self::project_config_path();
        if path.exists() && !force {
            return Err(SyncError::Config(format!(
                "{} already exists (use --force to overwrite)",
                path.display()
            )));
        }
        fs::write(&path, Self::default_project_config())?;
        info!("Created project config: {}", path.display());
        Ok(path)
    }

    fn default_project_config() -> &'static str {
        r#"# legisync configuration
# Project settings; LEGISYNC_* environment variables override these.

version = "1.0"

[api]
# api_key = "..."          # or LEGISYNC_API_API_KEY
timeout_secs = 30
max_retries = 3
page_size = 250
page_delay_ms = 500

[storage]
db_path = "legisync.db"
raw_dir = "raw"
backup_retention_days = 30

[sync]
lookback_days = 7
selection_policy = "most_recent_update"

[backfill]
batch_size = 50
workers = 4

[ai]
provider = "anthropic"
# model = "claude-sonnet-4-20250514"
# api_key = "..."          # or the provider's usual env var
timeout_secs = 120
unknown_tag_policy = "reject"
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigLoader::load_from_file(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.backfill.workers, 4);
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legisync.toml");
        fs::write(
            &path,
            "[backfill]\nworkers = 1\nbatch_size = 10\n\n[sync]\nselection_policy = \"first_entry\"\n",
        )
        .unwrap();
        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.backfill.workers, 1);
        assert_eq!(config.backfill.batch_size, 10);
        assert_eq!(
            config.sync.selection_policy,
            crate::types::SelectionPolicy::FirstEntry
        );
    }

    #[test]
    fn test_invalid_file_rejected_by_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legisync.toml");
        fs::write(&path, "[backfill]\nworkers = 0\n").unwrap();
        assert!(ConfigLoader::load_from_file(&path).is_err());
    }

    #[test]
    fn test_default_template_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legisync.toml");
        fs::write(&path, ConfigLoader::default_project_config()).unwrap();
        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.ai.provider, "anthropic");
    }
}
