// src/states/python.rs

//! `state_py_exec_required_reached`: find and verify the configured interpreter.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::{ConfigFile, ensure_min_python_version};
use crate::dag::{Bootstrapper, EvaluationContext, KernelState, StateId, StateValue, state_value};
use crate::errors::Result;
use crate::exec::{CommandSpec, ProcessBackend};
use crate::logging;
use crate::types::{PyExec, PythonVersion};

/// An interpreter that satisfies the configured minimum version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredPython {
    pub python: PathBuf,
    pub version: PythonVersion,
}

/// Ask `python` for its version.
pub fn query_python_version(backend: &dyn ProcessBackend, python: &Path) -> Result<PythonVersion> {
    let spec = CommandSpec::new(python).arg("--version");
    let output = backend.run(&spec)?.ensure_success(&spec)?;
    // Older interpreters print the version on stderr.
    PythonVersion::from_version_output(&format!("{}\n{}", output.stdout, output.stderr))
}

/// Value: `Option<RequiredPython>`, `None` when the stride ceiling is below
/// `required`.
pub struct PyExecRequiredReached;

impl Bootstrapper for PyExecRequiredReached {
    fn evaluate_once(&self, _state: &StateId, ctx: &EvaluationContext) -> Result<StateValue> {
        let config = ctx.evaluate_as::<ConfigFile>(KernelState::ConfigLoaded)?;
        let py_exec = ctx.evaluate_as::<PyExec>(KernelState::InputPyExecVarLoaded)?;

        if ctx.max_stride() < PyExec::Required {
            info!(max_stride = %ctx.max_stride(), "not advancing to the required interpreter");
            logging::set_state_stride(PyExec::Arbitrary.max(py_exec));
            return Ok(state_value(None::<RequiredPython>));
        }

        let python = PathBuf::from(&config.python().exec);
        let version = query_python_version(ctx.backend(), &python)?;
        ensure_min_python_version(version, config.python().min_version)?;

        info!(python = %python.display(), %version, "required interpreter verified");
        logging::set_state_stride(PyExec::Required.max(py_exec));
        Ok(state_value(Some(RequiredPython { python, version })))
    }
}
