// src/states/packages.rs

//! Package installation and the universal sink.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::ConfigFile;
use crate::dag::{Bootstrapper, EvaluationContext, KernelState, StateId, StateValue, state_value};
use crate::errors::Result;
use crate::exec::PackageDriver;
use crate::fs::{read_optional, write_if_changed};
use crate::states::project::ProjectDirs;
use crate::types::PyExec;

/// File in the cache dir holding the fingerprint of the last install.
pub const PACKAGES_FINGERPRINT_FILE: &str = "packages.blake3";

/// Fingerprint of what an install would produce: driver plus package specs.
pub fn packages_fingerprint(driver: PackageDriver, packages: &[String]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(driver.name().as_bytes());
    for package in packages {
        hasher.update(b"\n");
        hasher.update(package.as_bytes());
    }
    format!("{}\n", hasher.finalize().to_hex())
}

fn fingerprint_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(PACKAGES_FINGERPRINT_FILE)
}

/// `state_packages_installed`. Value: number of packages installed by this run.
pub struct PackagesInstalled;

impl Bootstrapper for PackagesInstalled {
    fn evaluate_once(&self, _state: &StateId, ctx: &EvaluationContext) -> Result<StateValue> {
        let stride = ctx.evaluate_as::<PyExec>(KernelState::PyExecVenvReached)?;
        let cache_dir = ctx.evaluate_as::<PathBuf>(KernelState::CacheDirCreated)?;
        let config = ctx.evaluate_as::<ConfigFile>(KernelState::ConfigLoaded)?;

        if stride < PyExec::Venv {
            info!(%stride, "packages are only installed from inside the venv");
            return Ok(state_value(0_usize));
        }

        let driver = ctx.package_driver();
        let fingerprint = packages_fingerprint(driver, config.packages());
        let marker = fingerprint_path(&cache_dir);
        if read_optional(&marker)?.as_deref() == Some(fingerprint.as_str()) {
            info!("packages up to date");
            return Ok(state_value(0_usize));
        }

        let dirs = ctx.evaluate_as::<ProjectDirs>(KernelState::ProjectDirsResolved)?;
        let venv = dirs.venv();
        for package in config.packages() {
            driver.install(ctx.backend(), &venv, package)?;
        }
        write_if_changed(&marker, fingerprint.as_bytes())?;

        info!(count = config.packages().len(), %driver, "packages installed");
        Ok(state_value(config.packages().len()))
    }
}

/// `state_env_bootstrapped`: the universal sink. Value: exit code `0`.
pub struct EnvBootstrapped;

impl Bootstrapper for EnvBootstrapped {
    fn evaluate_once(&self, _state: &StateId, ctx: &EvaluationContext) -> Result<StateValue> {
        let installed = ctx.evaluate_as::<usize>(KernelState::PackagesInstalled)?;
        let cache_dir = ctx.evaluate_as::<PathBuf>(KernelState::CacheDirCreated)?;
        info!(installed, cache_dir = %cache_dir.display(), "environment bootstrapped");
        Ok(state_value(0_i32))
    }
}
