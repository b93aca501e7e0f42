// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::types::PythonVersion;

/// Name of the configuration file looked up inside the env directory.
pub const CONFIG_FILE_NAME: &str = "protoprimer.toml";

/// Configuration exactly as read from `protoprimer.toml`.
///
/// ```toml
/// [python]
/// exec = "python3"
/// min_version = "3.8.0"
///
/// [project]
/// venv_dir = "venv"
/// cache_dir = ".protoprimer/cache"
///
/// [packages]
/// install = ["requests==2.32.3"]
/// ```
///
/// Every section is optional. Nothing here is validated yet; see
/// [`ConfigFile`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub python: PythonSection,

    #[serde(default)]
    pub project: ProjectSection,

    #[serde(default)]
    pub packages: PackagesSection,
}

/// `[python]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PythonSection {
    /// Interpreter used to create the venv (name on `PATH` or a path).
    #[serde(default = "default_python_exec")]
    pub exec: String,

    /// Lowest acceptable interpreter version, `X.Y` or `X.Y.Z`.
    #[serde(default = "default_min_version")]
    pub min_version: String,
}

fn default_python_exec() -> String {
    "python3".to_string()
}

fn default_min_version() -> String {
    "3.8.0".to_string()
}

impl Default for PythonSection {
    fn default() -> Self {
        Self {
            exec: default_python_exec(),
            min_version: default_min_version(),
        }
    }
}

/// `[project]` section. Relative paths resolve against the env directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectSection {
    #[serde(default = "default_venv_dir")]
    pub venv_dir: PathBuf,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

fn default_venv_dir() -> PathBuf {
    PathBuf::from("venv")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".protoprimer/cache")
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            venv_dir: default_venv_dir(),
            cache_dir: default_cache_dir(),
        }
    }
}

/// `[packages]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackagesSection {
    /// Package specs handed verbatim to the package driver.
    #[serde(default)]
    pub install: Vec<String>,
}

/// Interpreter settings after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PythonSettings {
    pub exec: String,
    pub min_version: PythonVersion,
}

/// Validated configuration. Only obtainable through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    python: PythonSettings,
    project: ProjectSection,
    packages: Vec<String>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        python: PythonSettings,
        project: ProjectSection,
        packages: Vec<String>,
    ) -> Self {
        Self {
            python,
            project,
            packages,
        }
    }

    pub fn python(&self) -> &PythonSettings {
        &self.python
    }

    pub fn project(&self) -> &ProjectSection {
        &self.project
    }

    /// Package specs, in declaration order.
    pub fn packages(&self) -> &[String] {
        &self.packages
    }
}
