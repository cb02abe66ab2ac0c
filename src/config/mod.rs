//! Configuration Management
//!
//! Unified configuration with hierarchical resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/legisync/config.toml)
//! 3. Project config (legisync.toml)
//! 4. Environment variables (LEGISYNC_*)

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::*;
