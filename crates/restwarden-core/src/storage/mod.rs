mod config;

pub use config::Config;

use std::path::PathBuf;

/// Returns `~/.config/restwarden[-dev]/` based on RESTWARDEN_ENV.
///
/// Set RESTWARDEN_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("RESTWARDEN_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("restwarden-dev")
    } else {
        base_dir.join("restwarden")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Path of the persisted usage snapshot, `usage_stats.json` in the data dir.
pub fn usage_stats_path() -> std::io::Result<PathBuf> {
    Ok(data_dir()?.join("usage_stats.json"))
}
