mod config;
pub mod challenge_db;
pub mod migrations;

pub use challenge_db::ChallengeDb;
pub use config::{Config, DepositsConfig, DisplayConfig, EngineConfig};

use std::path::PathBuf;

/// Returns `~/.config/stashweek[-dev]/` based on STASHWEEK_ENV.
///
/// Set STASHWEEK_ENV=dev to use development data directory.
/// Set STASHWEEK_HOME to replace `~/.config` as the base directory.
///
/// # Errors
/// Returns an error if creating the data directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let base_dir = match std::env::var_os("STASHWEEK_HOME") {
        Some(home) => PathBuf::from(home),
        None => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config"),
    };

    let env = std::env::var("STASHWEEK_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("stashweek-dev")
    } else {
        base_dir.join("stashweek")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
