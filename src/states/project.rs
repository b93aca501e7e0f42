// src/states/project.rs

//! Configuration and the per-project directory layout.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::{ConfigFile, load_for_env_dir};
use crate::dag::{Bootstrapper, EvaluationContext, KernelState, StateId, StateValue, state_value};
use crate::errors::Result;
use crate::exec::VenvLayout;
use crate::fs::ensure_dir;

/// Absolute project directories derived from the env dir and config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDirs {
    pub env_dir: PathBuf,
    pub venv_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl ProjectDirs {
    pub fn resolve(env_dir: &Path, config: &ConfigFile) -> Self {
        let project = config.project();
        Self {
            env_dir: env_dir.to_path_buf(),
            venv_dir: env_dir.join(&project.venv_dir),
            cache_dir: env_dir.join(&project.cache_dir),
        }
    }

    pub fn venv(&self) -> VenvLayout {
        VenvLayout::new(&self.venv_dir)
    }
}

/// `state_config_loaded`
pub struct ConfigLoaded;

impl Bootstrapper for ConfigLoaded {
    fn evaluate_once(&self, _state: &StateId, ctx: &EvaluationContext) -> Result<StateValue> {
        let env_dir = ctx.evaluate_as::<PathBuf>(KernelState::EnvDirResolved)?;
        let config = load_for_env_dir(&env_dir)?;
        Ok(state_value(config))
    }
}

/// `state_project_dirs_resolved`
pub struct ProjectDirsResolved;

impl Bootstrapper for ProjectDirsResolved {
    fn evaluate_once(&self, _state: &StateId, ctx: &EvaluationContext) -> Result<StateValue> {
        let env_dir = ctx.evaluate_as::<PathBuf>(KernelState::EnvDirResolved)?;
        let config = ctx.evaluate_as::<ConfigFile>(KernelState::ConfigLoaded)?;
        Ok(state_value(ProjectDirs::resolve(&env_dir, &config)))
    }
}

/// `state_cache_dir_created`
pub struct CacheDirCreated;

impl Bootstrapper for CacheDirCreated {
    fn evaluate_once(&self, _state: &StateId, ctx: &EvaluationContext) -> Result<StateValue> {
        let dirs = ctx.evaluate_as::<ProjectDirs>(KernelState::ProjectDirsResolved)?;
        if ensure_dir(&dirs.cache_dir)? {
            info!(cache_dir = %dirs.cache_dir.display(), "created cache dir");
        }
        Ok(state_value(dirs.cache_dir))
    }
}
