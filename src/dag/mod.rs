// src/dag/mod.rs

//! The state engine.
//!
//! - [`state_id`] names states: a closed kernel set plus open extension ids.
//! - [`node`] holds one vertex and its memoizing, cycle-checking evaluation.
//! - [`bootstrapper`] is the contract state implementations satisfy.
//! - [`graph`] keys nodes by id and validates the declared structure.
//! - [`context`] owns the graph and inputs and routes `evaluate` requests.
//! - [`strategy`] decides what a run does with its terminal state.

pub mod bootstrapper;
pub mod context;
pub mod graph;
pub mod node;
pub mod state_id;
pub mod strategy;

pub use bootstrapper::{Bootstrapper, FnBootstrapper, StateValue, state_value};
pub use context::{EnvSnapshot, EvaluationContext, status_line};
pub use graph::StateGraph;
pub use node::{EvaluationStatus, StateNode};
pub use state_id::{KernelState, StateId, UNIVERSAL_SINK};
pub use strategy::{RunStrategy, print_graph};
