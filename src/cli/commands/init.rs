//! Init Command
//!
//! Writes a default project config and bootstraps the database schema.

use console::style;

use crate::config::ConfigLoader;
use crate::storage::Database;
use crate::types::Result;

pub fn run(force: bool) -> Result<()> {
    let config_path = ConfigLoader::init_project(force)?;
    let config = ConfigLoader::load()?;

    // Opening creates the schema
    Database::open(&config.storage.db_path)?;
    std::fs::create_dir_all(&config.storage.raw_dir)?;

    println!("{}", style("Initialized legisync").green().bold());
    println!("  Config:   {}", config_path.display());
    println!("  Database: {}", config.storage.db_path.display());
    println!("  Raw dir:  {}", config.storage.raw_dir.display());
    println!();
    println!("Set LEGISYNC_API_API_KEY (or api.api_key) before fetching.");
    Ok(())
}
