// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::config::model::{CONFIG_FILE_NAME, ConfigFile, RawConfigFile};
use crate::errors::{PrimerError, Result};

/// Deserialize a configuration file without validating it.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Read and validate a configuration file.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Location of the configuration file for an env directory.
pub fn config_path(env_dir: &Path) -> PathBuf {
    env_dir.join(CONFIG_FILE_NAME)
}

/// Load the configuration for `env_dir`.
///
/// An absent file means all defaults; an absent directory is an error.
pub fn load_for_env_dir(env_dir: &Path) -> Result<ConfigFile> {
    if !env_dir.is_dir() {
        return Err(PrimerError::ConfigError(format!(
            "env directory {} does not exist",
            env_dir.display()
        )));
    }

    let path = config_path(env_dir);
    if !path.is_file() {
        debug!(path = %path.display(), "no config file; using defaults");
        return ConfigFile::try_from(RawConfigFile::default());
    }

    debug!(path = %path.display(), "loading config file");
    load_and_validate(&path)
}
