// src/dag/state_id.rs

//! State identifiers.
//!
//! Kernel states form a closed set ([`KernelState`]); extensions mint their
//! own identifiers with [`StateId::new`] or [`StateId::from_static`]. Both
//! resolve through the same keyed graph, so an extension can depend on a
//! kernel state by name without importing its implementation.

use std::borrow::Cow;
use std::fmt;

/// Stable string name of a state, unique within a graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(Cow<'static, str>);

impl StateId {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for StateId {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl From<KernelState> for StateId {
    fn from(state: KernelState) -> Self {
        state.id()
    }
}

/// States shipped by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelState {
    ArgsParsed,
    InputPyExecVarLoaded,
    EnvDirResolved,
    ConfigLoaded,
    ProjectDirsResolved,
    PyExecRequiredReached,
    VenvCreated,
    VenvDriverChecked,
    PyExecVenvReached,
    CacheDirCreated,
    PackagesInstalled,
    EnvBootstrapped,
}

impl KernelState {
    pub const ALL: [KernelState; 12] = [
        KernelState::ArgsParsed,
        KernelState::InputPyExecVarLoaded,
        KernelState::EnvDirResolved,
        KernelState::ConfigLoaded,
        KernelState::ProjectDirsResolved,
        KernelState::PyExecRequiredReached,
        KernelState::VenvCreated,
        KernelState::VenvDriverChecked,
        KernelState::PyExecVenvReached,
        KernelState::CacheDirCreated,
        KernelState::PackagesInstalled,
        KernelState::EnvBootstrapped,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            KernelState::ArgsParsed => "state_args_parsed",
            KernelState::InputPyExecVarLoaded => "state_input_py_exec_var_loaded",
            KernelState::EnvDirResolved => "state_env_dir_resolved",
            KernelState::ConfigLoaded => "state_config_loaded",
            KernelState::ProjectDirsResolved => "state_project_dirs_resolved",
            KernelState::PyExecRequiredReached => "state_py_exec_required_reached",
            KernelState::VenvCreated => "state_venv_created",
            KernelState::VenvDriverChecked => "state_venv_driver_checked",
            KernelState::PyExecVenvReached => "state_py_exec_venv_reached",
            KernelState::CacheDirCreated => "state_cache_dir_created",
            KernelState::PackagesInstalled => "state_packages_installed",
            KernelState::EnvBootstrapped => "state_env_bootstrapped",
        }
    }

    pub const fn id(self) -> StateId {
        StateId::from_static(self.name())
    }
}

/// Default terminal state of a fresh context: the fully bootstrapped env.
pub const UNIVERSAL_SINK: KernelState = KernelState::EnvBootstrapped;

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn kernel_names_are_unique() {
        let names: HashSet<&str> = KernelState::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(names.len(), KernelState::ALL.len());
    }

    #[test]
    fn owned_and_static_ids_compare_equal() {
        assert_eq!(
            StateId::new("state_env_bootstrapped"),
            KernelState::EnvBootstrapped.id()
        );
    }
}
