// src/exec/driver.rs

//! Package-manager drivers (`pip` and `uv`) and venv layout helpers.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, info};

use crate::dag::EnvSnapshot;
use crate::errors::{PrimerError, Result};
use crate::types::{USE_UV_VAR, str_to_bool};

use super::backend::{CommandSpec, ProcessBackend};

/// Marker file every venv carries at its root.
pub const PYVENV_CFG: &str = "pyvenv.cfg";

/// Package-manager driver, chosen once per context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageDriver {
    Pip,
    Uv,
}

impl PackageDriver {
    /// Select the driver from `PROTOPRIMER_USE_UV`.
    ///
    /// Absent or empty means `pip`; any other value must be boolean-like.
    pub fn from_env(env: &EnvSnapshot) -> Result<Self> {
        let Some(value) = env.get(USE_UV_VAR) else {
            return Ok(PackageDriver::Pip);
        };
        if value.trim().is_empty() {
            return Ok(PackageDriver::Pip);
        }
        let use_uv = str_to_bool(value).map_err(|_| {
            PrimerError::ConfigError(format!(
                "{USE_UV_VAR} must be a boolean-like value, got {value:?}"
            ))
        })?;
        Ok(if use_uv {
            PackageDriver::Uv
        } else {
            PackageDriver::Pip
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            PackageDriver::Pip => "pip",
            PackageDriver::Uv => "uv",
        }
    }

    /// Create a venv at `venv_dir` using `python`.
    pub fn create_venv(
        self,
        backend: &dyn ProcessBackend,
        python: &Path,
        venv_dir: &Path,
    ) -> Result<()> {
        let spec = match self {
            PackageDriver::Pip => CommandSpec::new(python)
                .args(["-m", "venv"])
                .path_arg(venv_dir),
            PackageDriver::Uv => CommandSpec::new("uv")
                .arg("venv")
                .arg("--python")
                .path_arg(python)
                .path_arg(venv_dir),
        };
        info!(driver = self.name(), venv = %venv_dir.display(), "creating venv");
        backend.run(&spec)?.ensure_success(&spec)?;
        Ok(())
    }

    /// Install one package spec into the venv.
    pub fn install(
        self,
        backend: &dyn ProcessBackend,
        venv: &VenvLayout,
        package_name: &str,
    ) -> Result<()> {
        let spec = match self {
            PackageDriver::Pip => CommandSpec::new(venv.python())
                .args(["-m", "pip", "install"])
                .arg(package_name),
            PackageDriver::Uv => CommandSpec::new("uv")
                .args(["pip", "install", "--python"])
                .path_arg(&venv.python())
                .arg(package_name),
        }
        .env("VIRTUAL_ENV", venv.root().to_string_lossy().into_owned());
        debug!(driver = self.name(), package = package_name, "installing package");
        backend.run(&spec)?.ensure_success(&spec)?;
        Ok(())
    }
}

impl fmt::Display for PackageDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Paths inside a venv.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VenvLayout {
    root: PathBuf,
}

impl VenvLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bin_dir(&self) -> PathBuf {
        if cfg!(windows) {
            self.root.join("Scripts")
        } else {
            self.root.join("bin")
        }
    }

    pub fn python(&self) -> PathBuf {
        if cfg!(windows) {
            self.bin_dir().join("python.exe")
        } else {
            self.bin_dir().join("python")
        }
    }

    pub fn pyvenv_cfg(&self) -> PathBuf {
        self.root.join(PYVENV_CFG)
    }

    /// A venv exists once its marker file does.
    pub fn exists(&self) -> bool {
        self.pyvenv_cfg().is_file()
    }
}

/// Which driver created an existing venv; `None` if there is no venv.
pub fn detect_venv_driver(venv: &VenvLayout) -> Result<Option<PackageDriver>> {
    let path = venv.pyvenv_cfg();
    if !path.is_file() {
        return Ok(None);
    }
    let contents = fs::read_to_string(&path)?;
    Ok(Some(parse_pyvenv_cfg(&contents)?))
}

/// A `uv = <version>` line marks a `uv`-created venv; anything else is `pip`.
pub fn parse_pyvenv_cfg(contents: &str) -> Result<PackageDriver> {
    let uv_line = Regex::new(r"(?m)^[ \t]*uv[ \t]*=[ \t]*\S+").map_err(anyhow::Error::from)?;
    Ok(if uv_line.is_match(contents) {
        PackageDriver::Uv
    } else {
        PackageDriver::Pip
    })
}
