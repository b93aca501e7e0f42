// src/states/mod.rs

//! Kernel state implementations.
//!
//! Every state requests its parents through the context and declares the
//! same ids in its node, so `--print-graph` and `validate_from` see the
//! graph the evaluators actually walk.

pub mod inputs;
pub mod packages;
pub mod project;
pub mod python;
pub mod venv;

use crate::dag::{Bootstrapper, KernelState, StateGraph, StateNode};
use crate::errors::Result;

pub use packages::{PACKAGES_FINGERPRINT_FILE, packages_fingerprint};
pub use project::ProjectDirs;
pub use python::RequiredPython;
pub use venv::{is_inside_venv, venv_env};

fn kernel_node(
    state: KernelState,
    parents: &[KernelState],
    bootstrapper: impl Bootstrapper + 'static,
) -> StateNode {
    StateNode::new(
        state,
        parents.iter().map(|parent| parent.id()).collect(),
        bootstrapper,
    )
}

/// Register every kernel state on `graph`.
pub fn register_kernel_states(graph: &mut StateGraph) -> Result<()> {
    use KernelState::*;

    let nodes = [
        kernel_node(ArgsParsed, &[], inputs::ArgsParsed),
        kernel_node(InputPyExecVarLoaded, &[], inputs::InputPyExecVarLoaded),
        kernel_node(EnvDirResolved, &[ArgsParsed], inputs::EnvDirResolved),
        kernel_node(ConfigLoaded, &[EnvDirResolved], project::ConfigLoaded),
        kernel_node(
            ProjectDirsResolved,
            &[EnvDirResolved, ConfigLoaded],
            project::ProjectDirsResolved,
        ),
        kernel_node(
            PyExecRequiredReached,
            &[ConfigLoaded, InputPyExecVarLoaded],
            python::PyExecRequiredReached,
        ),
        kernel_node(
            VenvCreated,
            &[PyExecRequiredReached, ProjectDirsResolved],
            venv::VenvCreated,
        ),
        kernel_node(VenvDriverChecked, &[VenvCreated], venv::VenvDriverChecked),
        kernel_node(
            PyExecVenvReached,
            &[VenvDriverChecked, InputPyExecVarLoaded, ProjectDirsResolved],
            venv::PyExecVenvReached,
        ),
        kernel_node(CacheDirCreated, &[ProjectDirsResolved], project::CacheDirCreated),
        kernel_node(
            PackagesInstalled,
            &[PyExecVenvReached, CacheDirCreated, ConfigLoaded, ProjectDirsResolved],
            packages::PackagesInstalled,
        ),
        kernel_node(
            EnvBootstrapped,
            &[PackagesInstalled, CacheDirCreated],
            packages::EnvBootstrapped,
        ),
    ];

    for node in nodes {
        graph.register(node)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::UNIVERSAL_SINK;

    #[test]
    fn kernel_graph_is_complete_and_acyclic() {
        let mut graph = StateGraph::new();
        register_kernel_states(&mut graph).unwrap();
        assert_eq!(graph.len(), KernelState::ALL.len());
        graph.validate_from(&UNIVERSAL_SINK.id()).unwrap();
    }

    #[test]
    fn registering_twice_is_rejected() {
        let mut graph = StateGraph::new();
        register_kernel_states(&mut graph).unwrap();
        assert!(register_kernel_states(&mut graph).is_err());
    }
}
