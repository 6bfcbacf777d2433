use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::google_api::TASKS_API_BASE;

const APP_NAME: &str = "gtasks-cli";
const CONFIG_DIR_ENV: &str = "GTASKS_CONFIG_DIR";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// OAuth client secret downloaded from Google Cloud Console.
    pub credentials_path: PathBuf,
    /// Cached tokens. Defaults to `token.json` in the config directory.
    pub token_path: Option<PathBuf>,
    pub api_base: String,
    pub page_size: u32,
    pub consent_timeout_secs: u64,
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from("credentials.json"),
            token_path: None,
            api_base: TASKS_API_BASE.to_string(),
            page_size: 100,
            consent_timeout_secs: 300,
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    pub fn token_path(&self) -> Result<PathBuf> {
        match &self.token_path {
            Some(path) => Ok(path.clone()),
            None => Ok(get_config_dir()?.join("token.json")),
        }
    }
}

pub fn get_config_dir() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(path));
    }

    dirs::config_dir()
        .map(|dir| dir.join(APP_NAME))
        .context("Could not determine config directory")
}

pub fn get_config_file() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.toml"))
}

pub fn get_log_file() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("gtasks.log"))
}

/// Loads `path`, or the default config file when `None`. A missing default
/// file yields the defaults; a missing explicit file is an error.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config_file = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let default = get_config_file()?;
            if !default.exists() {
                return Ok(Config::default());
            }
            default
        }
    };

    let contents = fs::read_to_string(&config_file)
        .with_context(|| format!("Failed to read config file: {}", config_file.display()))?;

    toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file: {}", config_file.display()))
}
