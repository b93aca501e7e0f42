// src/config/validate.rs

use crate::config::model::{ConfigFile, PythonSettings, RawConfigFile};
use crate::errors::{PrimerError, Result};
use crate::types::PythonVersion;

/// Oldest interpreter the bootstrap supports at all.
pub const MIN_PYTHON_VERSION: PythonVersion = PythonVersion::new(3, 8, 0);

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = PrimerError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let python = validate_python(&raw)?;
        validate_project(&raw)?;
        validate_packages(&raw)?;
        Ok(ConfigFile::new_unchecked(
            python,
            raw.project,
            raw.packages.install,
        ))
    }
}

/// Fail unless `found` is at least `min`.
pub fn ensure_min_python_version(found: PythonVersion, min: PythonVersion) -> Result<()> {
    if found < min {
        return Err(PrimerError::ConfigError(format!(
            "python version {found} is below the min required {min}"
        )));
    }
    Ok(())
}

fn validate_python(cfg: &RawConfigFile) -> Result<PythonSettings> {
    if cfg.python.exec.trim().is_empty() {
        return Err(PrimerError::ConfigError(
            "[python].exec must not be empty".to_string(),
        ));
    }

    let min_version: PythonVersion = cfg
        .python
        .min_version
        .parse()
        .map_err(|e| PrimerError::ConfigError(format!("[python].min_version: {e}")))?;
    ensure_min_python_version(min_version, MIN_PYTHON_VERSION).map_err(|_| {
        PrimerError::ConfigError(format!(
            "[python].min_version {min_version} is below the min required {MIN_PYTHON_VERSION}"
        ))
    })?;

    Ok(PythonSettings {
        exec: cfg.python.exec.trim().to_string(),
        min_version,
    })
}

fn validate_project(cfg: &RawConfigFile) -> Result<()> {
    let project = &cfg.project;
    for (key, dir) in [("venv_dir", &project.venv_dir), ("cache_dir", &project.cache_dir)] {
        if dir.as_os_str().is_empty() {
            return Err(PrimerError::ConfigError(format!(
                "[project].{key} must not be empty"
            )));
        }
    }
    if project.venv_dir == project.cache_dir {
        return Err(PrimerError::ConfigError(format!(
            "[project].venv_dir and [project].cache_dir must differ (both are {:?})",
            project.venv_dir
        )));
    }
    Ok(())
}

fn validate_packages(cfg: &RawConfigFile) -> Result<()> {
    for (index, spec) in cfg.packages.install.iter().enumerate() {
        if spec.trim().is_empty() {
            return Err(PrimerError::ConfigError(format!(
                "[packages].install[{index}] must not be blank"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = ConfigFile::try_from(RawConfigFile::default()).unwrap();
        assert_eq!(cfg.python().exec, "python3");
        assert_eq!(cfg.python().min_version, MIN_PYTHON_VERSION);
        assert!(cfg.packages().is_empty());
    }

    #[test]
    fn min_version_boundary() {
        assert!(ensure_min_python_version(PythonVersion::new(3, 8, 0), MIN_PYTHON_VERSION).is_ok());
        let err = ensure_min_python_version(PythonVersion::new(3, 7, 5), MIN_PYTHON_VERSION)
            .unwrap_err();
        assert!(matches!(&err, PrimerError::ConfigError(_)));
        assert!(err.to_string().contains("below the min required"));
    }

    #[test]
    fn rejects_min_version_below_kernel_minimum() {
        let mut raw = RawConfigFile::default();
        raw.python.min_version = "3.7".to_string();
        let err = ConfigFile::try_from(raw).unwrap_err();
        assert!(err.to_string().contains("below the min required"));
    }

    #[test]
    fn rejects_unparsable_min_version() {
        let mut raw = RawConfigFile::default();
        raw.python.min_version = "three".to_string();
        assert!(matches!(
            ConfigFile::try_from(raw),
            Err(PrimerError::ConfigError(msg)) if msg.contains("min_version")
        ));
    }

    #[test]
    fn rejects_shared_project_dirs() {
        let mut raw = RawConfigFile::default();
        raw.project.cache_dir = raw.project.venv_dir.clone();
        assert!(matches!(
            ConfigFile::try_from(raw),
            Err(PrimerError::ConfigError(msg)) if msg.contains("must differ")
        ));
    }

    #[test]
    fn rejects_blank_package_spec() {
        let mut raw = RawConfigFile::default();
        raw.packages.install = vec!["requests".to_string(), "  ".to_string()];
        assert!(matches!(
            ConfigFile::try_from(raw),
            Err(PrimerError::ConfigError(msg)) if msg.contains("install[1]")
        ));
    }
}
