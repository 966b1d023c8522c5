mod config;
pub mod database;
pub mod migrations;

pub use config::{CloudConfig, CloudEndpoint, Config, Theme};
pub use database::{Database, SessionRecord, Stats};

use std::path::PathBuf;

use crate::error::StorageError;

/// Returns the directory holding `config.toml` and `pomosync.db`.
///
/// `POMOSYNC_DATA_DIR` wins outright. Otherwise `~/.config/pomosync`, or
/// `~/.config/pomosync-dev` when `POMOSYNC_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, StorageError> {
    let dir = match std::env::var_os("POMOSYNC_DATA_DIR") {
        Some(explicit) => PathBuf::from(explicit),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("POMOSYNC_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("pomosync-dev")
            } else {
                base_dir.join("pomosync")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| StorageError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
