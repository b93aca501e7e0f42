// src/lib.rs

//! Drop into an interactive shell inside the freshly bootstrapped venv.
//!
//! Adds `state_venv_shell_started` on top of the kernel sink and makes it
//! the run's final state.

use std::cell::RefCell;

use tracing::info;

use protoprimer::dag::{
    Bootstrapper, EvaluationContext, KernelState, StateId, StateNode, StateValue, UNIVERSAL_SINK,
};
use protoprimer::errors::{PrimerError, Result};
use protoprimer::exec::CommandSpec;
use protoprimer::states::{ProjectDirs, venv_env};

pub const VENV_SHELL_STARTED: StateId = StateId::from_static("state_venv_shell_started");

/// Shell used when `SHELL` is not set.
pub const DEFAULT_SHELL: &str = "/bin/sh";

const INTERACTIVE_FLAG: &str = "-i";

/// Re-execs the user's shell with the venv activated.
#[derive(Default)]
pub struct VenvShellStarted {
    shell_args: RefCell<Vec<String>>,
}

impl VenvShellStarted {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shell_args(&self) -> Vec<String> {
        self.shell_args.borrow().clone()
    }
}

impl Bootstrapper for VenvShellStarted {
    fn pre_evaluate(&self, _state: &StateId, _ctx: &EvaluationContext) -> Result<()> {
        let mut args = self.shell_args.borrow_mut();
        if !args.iter().any(|arg| arg == INTERACTIVE_FLAG) {
            args.push(INTERACTIVE_FLAG.to_string());
        }
        Ok(())
    }

    fn evaluate_once(&self, _state: &StateId, ctx: &EvaluationContext) -> Result<StateValue> {
        let code = ctx.evaluate_as::<i32>(UNIVERSAL_SINK)?;
        if code != 0 {
            return Err(PrimerError::ConfigError(format!(
                "{} finished with exit code {code}; not starting a shell",
                UNIVERSAL_SINK.name()
            )));
        }
        let dirs = ctx.evaluate_as::<ProjectDirs>(KernelState::ProjectDirsResolved)?;
        let venv = dirs.venv();

        let shell = ctx.env().get("SHELL").unwrap_or(DEFAULT_SHELL);
        let mut spec = CommandSpec::new(shell)
            .args(self.shell_args())
            .current_dir(&dirs.env_dir);
        for (key, value) in venv_env(&venv, ctx.env())? {
            spec = spec.env(key, value);
        }

        info!(shell, venv = %venv.root().display(), "starting venv shell");
        match ctx.backend().reexec(&spec)? {}
    }
}

/// Register the shell state and make it the final state.
pub fn customize(mut ctx: EvaluationContext) -> Result<EvaluationContext> {
    ctx.register_bootstrapper(StateNode::new(
        VENV_SHELL_STARTED,
        vec![UNIVERSAL_SINK.id(), KernelState::ProjectDirsResolved.id()],
        VenvShellStarted::new(),
    ))?;
    ctx.set_final_state(VENV_SHELL_STARTED);
    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use protoprimer::cli::parse_from;
    use protoprimer::dag::EvaluationStatus;
    use protoprimer::types::PY_EXEC_VAR;
    use protoprimer_test_utils::{
        ConfigBuilder, FAKE_REEXEC_MESSAGE, FakeProcessBackend, fake_context, init_tracing,
    };

    use super::*;

    #[test]
    fn customize_sets_final_state() {
        init_tracing();
        let backend = FakeProcessBackend::new();
        let ctx = customize(fake_context(&[], &backend)).unwrap();
        assert_eq!(ctx.target_state(), &VENV_SHELL_STARTED);
        ctx.graph().validate_from(&VENV_SHELL_STARTED).unwrap();
    }

    #[test]
    fn pre_evaluate_forces_interactive_once() {
        let backend = FakeProcessBackend::new();
        let ctx = fake_context(&[], &backend);
        let state = VenvShellStarted::new();
        state.pre_evaluate(&VENV_SHELL_STARTED, &ctx).unwrap();
        state.pre_evaluate(&VENV_SHELL_STARTED, &ctx).unwrap();
        assert_eq!(state.shell_args(), vec!["-i".to_string()]);
    }

    #[test]
    fn shell_is_started_inside_the_venv() {
        init_tracing();
        let repo = tempfile::tempdir().unwrap();
        ConfigBuilder::new().write_to(repo.path());
        let venv_dir = repo.path().join("venv");
        let venv_str = venv_dir.to_string_lossy().into_owned();

        let backend = FakeProcessBackend::new();
        let mut ctx = customize(fake_context(
            &[
                (PY_EXEC_VAR, "stride_py_venv"),
                ("VIRTUAL_ENV", venv_str.as_str()),
                ("SHELL", "/bin/zsh"),
                ("PATH", "/usr/bin"),
            ],
            &backend,
        ))
        .unwrap();

        let repo_str = repo.path().to_string_lossy().into_owned();
        let args = parse_from(["protoprimer", "--env", repo_str.as_str()]).unwrap();
        let mut out = Vec::new();
        let err = protoprimer::run(&mut ctx, args, &mut out).unwrap_err();
        assert!(err.to_string().contains("state_venv_shell_started"), "{err}");

        let reexecs = backend.reexecs();
        assert_eq!(reexecs.len(), 1);
        let shell = &reexecs[0];
        assert_eq!(shell.program.to_string_lossy(), "/bin/zsh");
        assert_eq!(shell.args, vec!["-i".to_string()]);
        assert_eq!(shell.env_value("VIRTUAL_ENV"), Some(venv_str.as_str()));
        assert_eq!(shell.env_value(PY_EXEC_VAR), Some("stride_py_venv"));
        assert!(format!("{:?}", ctx.graph().lookup(&VENV_SHELL_STARTED).unwrap().failure_reason())
            .contains(FAKE_REEXEC_MESSAGE));
        assert_eq!(
            ctx.graph().lookup(&UNIVERSAL_SINK.id()).unwrap().status(),
            EvaluationStatus::Completed
        );
    }
}
