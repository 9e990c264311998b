//! JSON persistence of `NightModeConfig`.
//! Missing keys fall back to the built-in defaults, so partial files are fine.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::processing::pipeline::NightModeConfig;
use crate::utils::error_handling::{NightModeError, Result};

pub const CONFIG_FILE_NAME: &str = "nightmode.json";

/// `nightmode.json` next to the executable, or in the working directory when that is unknown
pub fn default_config_path() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(CONFIG_FILE_NAME)))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

fn config_error(path: &Path, reason: impl ToString) -> NightModeError {
    NightModeError::Config { path: path.to_path_buf(), reason: reason.to_string() }
}

/// Reads and validates a configuration file
pub fn load_config(path: &Path) -> Result<NightModeConfig> {
    let content = fs::read_to_string(path).map_err(|e| config_error(path, e))?;
    let config: NightModeConfig = serde_json::from_str(&content).map_err(|e| config_error(path, e))?;
    config.validate()?;
    Ok(config)
}

/// Writes the configuration as pretty-printed JSON
pub fn save_config(config: &NightModeConfig, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(config).map_err(|e| config_error(path, e))?;
    fs::write(path, json).map_err(|e| config_error(path, e))
}
