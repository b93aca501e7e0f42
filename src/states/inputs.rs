// src/states/inputs.rs

//! Leaf states: parsed arguments, the stride variable and the env directory.

use std::path::PathBuf;

use tracing::debug;

use crate::cli::ParsedArgs;
use crate::dag::{Bootstrapper, EvaluationContext, KernelState, StateId, StateValue, state_value};
use crate::errors::{PrimerError, Result};
use crate::logging;
use crate::types::{PY_EXEC_VAR, PyExec};

/// `state_args_parsed`: the arguments the driver stored on the context.
pub struct ArgsParsed;

impl Bootstrapper for ArgsParsed {
    fn evaluate_once(&self, _state: &StateId, ctx: &EvaluationContext) -> Result<StateValue> {
        let args: ParsedArgs = ctx.parsed_args()?.clone();
        Ok(state_value(args))
    }
}

/// `state_input_py_exec_var_loaded`: the stride this process was started at.
pub struct InputPyExecVarLoaded;

impl Bootstrapper for InputPyExecVarLoaded {
    fn evaluate_once(&self, _state: &StateId, ctx: &EvaluationContext) -> Result<StateValue> {
        let py_exec = PyExec::from_env_value(ctx.env().get(PY_EXEC_VAR))?;
        debug!(%py_exec, "loaded {PY_EXEC_VAR}");
        logging::set_py_exec(py_exec);
        Ok(state_value(py_exec))
    }
}

/// `state_env_dir_resolved`: absolute directory holding `protoprimer.toml`.
pub struct EnvDirResolved;

impl Bootstrapper for EnvDirResolved {
    fn evaluate_once(&self, _state: &StateId, ctx: &EvaluationContext) -> Result<StateValue> {
        let args = ctx.evaluate_as::<ParsedArgs>(KernelState::ArgsParsed)?;
        let requested = match args.env {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };
        let env_dir: PathBuf = std::path::absolute(&requested)?;
        if !env_dir.is_dir() {
            return Err(PrimerError::ConfigError(format!(
                "env directory {} does not exist",
                env_dir.display()
            )));
        }
        debug!(env_dir = %env_dir.display(), "resolved env dir");
        Ok(state_value(env_dir))
    }
}
