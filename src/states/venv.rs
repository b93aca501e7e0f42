// src/states/venv.rs

//! Venv creation, driver consistency and the switch into the venv.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::anyhow;
use tracing::{info, warn};

use crate::dag::{
    Bootstrapper, EnvSnapshot, EvaluationContext, KernelState, StateId, StateValue, state_value,
};
use crate::errors::{PrimerError, Result};
use crate::exec::{CommandSpec, PackageDriver, VenvLayout, detect_venv_driver};
use crate::logging;
use crate::states::project::ProjectDirs;
use crate::states::python::RequiredPython;
use crate::types::{PY_EXEC_VAR, PyExec};

/// Variables that make a child process run inside `venv`.
///
/// `PATH` is prefixed with the venv bin dir on top of `env`'s own `PATH`.
pub fn venv_env(venv: &VenvLayout, env: &EnvSnapshot) -> Result<Vec<(String, String)>> {
    let mut paths = vec![venv.bin_dir()];
    if let Some(current) = env.get("PATH") {
        paths.extend(std::env::split_paths(&OsString::from(current)));
    }
    let path = std::env::join_paths(paths).map_err(|e| anyhow!("building PATH: {e}"))?;

    Ok(vec![
        (PY_EXEC_VAR.to_string(), PyExec::Venv.env_value().to_string()),
        (
            "VIRTUAL_ENV".to_string(),
            venv.root().to_string_lossy().into_owned(),
        ),
        ("PATH".to_string(), path.to_string_lossy().into_owned()),
    ])
}

/// Whether `VIRTUAL_ENV` in `env` points at `venv`.
pub fn is_inside_venv(venv: &VenvLayout, env: &EnvSnapshot) -> bool {
    env.get("VIRTUAL_ENV")
        .is_some_and(|active| same_path(Path::new(active), venv.root()))
}

fn same_path(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// `state_venv_created`. Value: `Option<VenvLayout>`.
pub struct VenvCreated;

impl Bootstrapper for VenvCreated {
    fn evaluate_once(&self, _state: &StateId, ctx: &EvaluationContext) -> Result<StateValue> {
        let required =
            ctx.evaluate_as::<Option<RequiredPython>>(KernelState::PyExecRequiredReached)?;
        let dirs = ctx.evaluate_as::<ProjectDirs>(KernelState::ProjectDirsResolved)?;

        let Some(required) = required else {
            return Ok(state_value(None::<VenvLayout>));
        };

        let venv = dirs.venv();
        if venv.exists() {
            info!(venv = %venv.root().display(), "reusing existing venv");
            return Ok(state_value(Some(venv)));
        }

        ctx.package_driver()
            .create_venv(ctx.backend(), &required.python, venv.root())?;
        if !venv.exists() {
            return Err(PrimerError::Other(anyhow!(
                "venv creation finished but {} is missing",
                venv.pyvenv_cfg().display()
            )));
        }
        Ok(state_value(Some(venv)))
    }
}

/// `state_venv_driver_checked`. Value: `Option<PackageDriver>`.
///
/// A venv made by one driver is not managed with the other.
pub struct VenvDriverChecked;

impl Bootstrapper for VenvDriverChecked {
    fn evaluate_once(&self, _state: &StateId, ctx: &EvaluationContext) -> Result<StateValue> {
        let Some(venv) = ctx.evaluate_as::<Option<VenvLayout>>(KernelState::VenvCreated)? else {
            return Ok(state_value(None::<PackageDriver>));
        };

        let expected = ctx.package_driver();
        let found = detect_venv_driver(&venv)?.ok_or_else(|| {
            PrimerError::ConfigError(format!(
                "{} is not a venv (no pyvenv.cfg)",
                venv.root().display()
            ))
        })?;
        if found != expected {
            return Err(PrimerError::ConfigError(format!(
                "venv {} was created by {found} but the selected package driver is {expected}; \
                 remove the venv or change PROTOPRIMER_USE_UV",
                venv.root().display()
            )));
        }
        Ok(state_value(Some(found)))
    }
}

/// `state_py_exec_venv_reached`. Value: the stride this process ends up at.
///
/// When the ceiling allows `venv` and this process is not running inside the
/// venv yet, the process is replaced and this never returns.
pub struct PyExecVenvReached;

impl Bootstrapper for PyExecVenvReached {
    fn evaluate_once(&self, _state: &StateId, ctx: &EvaluationContext) -> Result<StateValue> {
        let driver = ctx.evaluate_as::<Option<PackageDriver>>(KernelState::VenvDriverChecked)?;
        let py_exec = ctx.evaluate_as::<PyExec>(KernelState::InputPyExecVarLoaded)?;
        let dirs = ctx.evaluate_as::<ProjectDirs>(KernelState::ProjectDirsResolved)?;

        if driver.is_none() {
            return Ok(state_value(PyExec::Arbitrary));
        }

        let venv = dirs.venv();
        if py_exec == PyExec::Venv {
            if !is_inside_venv(&venv, ctx.env()) {
                return Err(PrimerError::ConfigError(format!(
                    "{PY_EXEC_VAR} claims the venv stride but VIRTUAL_ENV is {:?}, not {}",
                    ctx.env().get("VIRTUAL_ENV").unwrap_or(""),
                    venv.root().display()
                )));
            }
            let reached = PyExec::Venv.min(ctx.max_stride());
            logging::set_state_stride(reached);
            return Ok(state_value(reached));
        }

        if ctx.max_stride() < PyExec::Venv {
            info!(max_stride = %ctx.max_stride(), "not switching into the venv");
            return Ok(state_value(PyExec::Required));
        }

        let spec = reexec_spec(&venv, ctx.env())?;
        info!(venv = %venv.root().display(), "switching into the venv");
        match ctx.backend().reexec(&spec)? {}
    }
}

/// This executable with the same arguments, inside `venv`.
fn reexec_spec(venv: &VenvLayout, env: &EnvSnapshot) -> Result<CommandSpec> {
    let program: PathBuf = std::env::current_exe()?;
    let mut spec = CommandSpec::new(program).args(
        std::env::args_os()
            .skip(1)
            .map(|arg| arg.to_string_lossy().into_owned()),
    );
    for (key, value) in venv_env(venv, env)? {
        spec = spec.env(key, value);
    }
    if env.get("VIRTUAL_ENV").is_some() && !is_inside_venv(venv, env) {
        warn!(
            active = env.get("VIRTUAL_ENV").unwrap_or(""),
            "a different venv is active; overriding VIRTUAL_ENV"
        );
    }
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn venv_env_prefixes_path() {
        let venv = VenvLayout::new("/work/repo/venv");
        let env = EnvSnapshot::from_pairs([("PATH".to_string(), "/usr/bin".to_string())]);
        let vars = venv_env(&venv, &env).unwrap();

        let lookup = |key: &str| {
            vars.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(lookup(PY_EXEC_VAR), "stride_py_venv");
        assert_eq!(lookup("VIRTUAL_ENV"), "/work/repo/venv");
        if cfg!(unix) {
            assert_eq!(lookup("PATH"), "/work/repo/venv/bin:/usr/bin");
        }
    }

    #[test]
    fn inside_venv_requires_matching_virtual_env() {
        let venv = VenvLayout::new("/work/repo/venv");
        let mut env = EnvSnapshot::default();
        assert!(!is_inside_venv(&venv, &env));
        env.set("VIRTUAL_ENV", "/elsewhere/venv");
        assert!(!is_inside_venv(&venv, &env));
        env.set("VIRTUAL_ENV", "/work/repo/venv");
        assert!(is_inside_venv(&venv, &env));
    }
}
