mod config;
pub mod database;
pub mod migrations;

pub use config::{CalendarConfig, Config, RemoteConfig, SyncConfig};
pub use database::{CacheRow, CacheTable, CacheWatch, Database};

use std::path::PathBuf;

/// Returns `~/.config/campuscal[-dev]/` based on CAMPUSCAL_ENV.
///
/// Set CAMPUSCAL_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("CAMPUSCAL_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("campuscal-dev")
    } else {
        base_dir.join("campuscal")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
