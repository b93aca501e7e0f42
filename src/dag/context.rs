// src/dag/context.rs

//! The evaluation context: graph, inputs and process-wide knobs.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::io::Write;

use tracing::{debug, warn};

use crate::cli::ParsedArgs;
use crate::dag::bootstrapper::StateValue;
use crate::dag::strategy::RunStrategy;
use crate::dag::{StateGraph, StateId, StateNode, UNIVERSAL_SINK};
use crate::errors::{PrimerError, Result};
use crate::exec::{PackageDriver, ProcessBackend, RealProcessBackend};
use crate::types::PyExec;

/// Copy of the process environment taken when a context is built.
///
/// Later changes to the real environment do not leak into a running context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    /// Capture the current process environment (non-UTF-8 entries are skipped).
    pub fn capture() -> Self {
        Self::from_pairs(
            std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
        )
    }

    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            vars: pairs.into_iter().collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }
}

/// Everything a single bootstrap run evaluates against.
///
/// Built once per process. Extensions mutate it (through `&mut self`
/// methods) before evaluation starts; evaluation only needs `&self`, so the
/// graph cannot change while states are being computed.
pub struct EvaluationContext {
    graph: StateGraph,
    parsed_args: Option<ParsedArgs>,
    universal_sink: StateId,
    final_state: Option<StateId>,
    package_driver: PackageDriver,
    max_stride: Cell<PyExec>,
    run_strategy: RunStrategy,
    env: EnvSnapshot,
    backend: Box<dyn ProcessBackend>,
    /// States currently being evaluated, outermost first.
    request_chain: RefCell<Vec<StateId>>,
}

impl EvaluationContext {
    /// Build a context with every kernel state registered.
    pub fn new(env: EnvSnapshot, backend: Box<dyn ProcessBackend>) -> Result<Self> {
        let package_driver = PackageDriver::from_env(&env)?;
        debug!(driver = %package_driver, "selected package driver");

        let mut graph = StateGraph::new();
        crate::states::register_kernel_states(&mut graph)?;

        Ok(Self {
            graph,
            parsed_args: None,
            universal_sink: UNIVERSAL_SINK.id(),
            final_state: None,
            package_driver,
            max_stride: Cell::new(PyExec::Venv),
            run_strategy: RunStrategy::default(),
            env,
            backend,
            request_chain: RefCell::new(Vec::new()),
        })
    }

    /// Production constructor: real environment, real processes.
    pub fn from_process_env() -> Result<Self> {
        Self::new(EnvSnapshot::capture(), Box::new(RealProcessBackend::new()?))
    }

    pub fn graph(&self) -> &StateGraph {
        &self.graph
    }

    pub fn env(&self) -> &EnvSnapshot {
        &self.env
    }

    pub fn backend(&self) -> &dyn ProcessBackend {
        self.backend.as_ref()
    }

    pub fn package_driver(&self) -> PackageDriver {
        self.package_driver
    }

    pub fn parsed_args(&self) -> Result<&ParsedArgs> {
        self.parsed_args.as_ref().ok_or_else(|| {
            PrimerError::ConfigError("command-line arguments have not been parsed yet".to_string())
        })
    }

    pub fn set_parsed_args(&mut self, args: ParsedArgs) {
        self.parsed_args = Some(args);
    }

    pub fn universal_sink(&self) -> &StateId {
        &self.universal_sink
    }

    pub fn set_universal_sink(&mut self, id: impl Into<StateId>) {
        self.universal_sink = id.into();
    }

    pub fn final_state(&self) -> Option<&StateId> {
        self.final_state.as_ref()
    }

    pub fn set_final_state(&mut self, id: impl Into<StateId>) {
        self.final_state = Some(id.into());
    }

    /// The state a run strategy starts from: `final_state`, else the sink.
    pub fn target_state(&self) -> &StateId {
        self.final_state.as_ref().unwrap_or(&self.universal_sink)
    }

    pub fn run_strategy(&self) -> RunStrategy {
        self.run_strategy
    }

    pub fn set_run_strategy(&mut self, strategy: RunStrategy) {
        self.run_strategy = strategy;
    }

    pub fn max_stride(&self) -> PyExec {
        self.max_stride.get()
    }

    /// Lower the stride ceiling; never raises it.
    pub fn set_max_stride(&self, stride: PyExec) {
        let current = self.max_stride.get();
        if stride < current {
            debug!(from = %current, to = %stride, "lowering max stride");
            self.max_stride.set(stride);
        }
    }

    /// Add a state; fails if the id is taken.
    pub fn register_bootstrapper(&mut self, node: StateNode) -> Result<()> {
        self.graph.register(node)
    }

    /// Add or overwrite a state (last registration wins).
    pub fn replace_bootstrapper(&mut self, node: StateNode) -> Option<StateNode> {
        self.graph.replace(node)
    }

    /// Evaluate a state by id, memoized for the life of the context.
    pub fn evaluate(&self, id: &StateId) -> Result<StateValue> {
        let node = self.graph.lookup(id)?;
        self.check_declared_request(id);

        self.request_chain.borrow_mut().push(id.clone());
        let result = node.evaluate(self);
        self.request_chain.borrow_mut().pop();

        result
    }

    /// Evaluate a state and downcast its value.
    pub fn evaluate_as<T>(&self, id: impl Into<StateId>) -> Result<T>
    where
        T: Clone + 'static,
    {
        let id = id.into();
        let value = self.evaluate(&id)?;
        value
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| PrimerError::ValueType {
                state: id,
                expected: std::any::type_name::<T>(),
            })
    }

    /// Snapshot of the states currently being evaluated, outermost first.
    pub fn request_chain(&self) -> Vec<StateId> {
        self.request_chain.borrow().clone()
    }

    /// Portion of the request chain that loops back to `id`.
    pub(crate) fn cycle_path(&self, id: &StateId) -> Vec<StateId> {
        let chain = self.request_chain.borrow();
        match chain.iter().position(|entry| entry == id) {
            Some(start) if start + 1 < chain.len() => chain[start..].to_vec(),
            _ => vec![id.clone(), id.clone()],
        }
    }

    /// Write the terminal `SUCCESS`/`FAILURE` line to stderr.
    pub fn report_success_status(&self, is_successful: bool) {
        let mut stderr = std::io::stderr().lock();
        // Nothing sensible to do if stderr is gone.
        let _ = writeln!(stderr, "{}", status_line(is_successful));
    }

    /// Declared parents drift from actual requests silently otherwise.
    fn check_declared_request(&self, id: &StateId) {
        let chain = self.request_chain.borrow();
        let Some(requester) = chain.last() else {
            return;
        };
        let Ok(node) = self.graph.lookup(requester) else {
            return;
        };
        if !node.parents().contains(id) {
            warn!(
                state = %requester,
                requested = %id,
                "state requested a parent it does not declare"
            );
        }
    }
}

/// Text of the terminal status line.
pub fn status_line(is_successful: bool) -> &'static str {
    if is_successful { "SUCCESS" } else { "FAILURE" }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::dag::state_value;
    use crate::exec::backend::RefusingBackend;
    use crate::types::USE_UV_VAR;

    fn context() -> EvaluationContext {
        EvaluationContext::new(EnvSnapshot::default(), Box::new(RefusingBackend)).unwrap()
    }

    fn counting_node(
        id: &'static str,
        parents: &[&'static str],
        calls: Rc<Cell<u32>>,
        value: i32,
    ) -> StateNode {
        let requested: Vec<StateId> = parents.iter().map(|p| StateId::from_static(*p)).collect();
        let to_request = requested.clone();
        StateNode::from_fn(id, requested, move |ctx| {
            calls.set(calls.get() + 1);
            for parent in &to_request {
                ctx.evaluate(parent)?;
            }
            Ok(state_value(value))
        })
    }

    #[test]
    fn kernel_states_are_registered_and_sink_is_set() {
        let ctx = context();
        assert_eq!(ctx.universal_sink(), &UNIVERSAL_SINK.id());
        assert_eq!(ctx.target_state(), &UNIVERSAL_SINK.id());
        for state in crate::dag::KernelState::ALL {
            assert!(ctx.graph().contains(&state.id()), "{} missing", state.name());
        }
        ctx.graph().validate_from(ctx.universal_sink()).unwrap();
    }

    #[test]
    fn first_evaluation_dominates() {
        let mut ctx = context();
        let calls = Rc::new(Cell::new(0));
        ctx.register_bootstrapper(counting_node("x", &[], Rc::clone(&calls), 7))
            .unwrap();

        assert_eq!(ctx.evaluate_as::<i32>("x").unwrap(), 7);
        assert_eq!(ctx.evaluate_as::<i32>("x").unwrap(), 7);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn parents_complete_before_child_stores_value() {
        let mut ctx = context();
        let parent_calls = Rc::new(Cell::new(0));
        let child_calls = Rc::new(Cell::new(0));
        ctx.register_bootstrapper(counting_node("parent", &[], Rc::clone(&parent_calls), 1))
            .unwrap();
        ctx.register_bootstrapper(counting_node(
            "child",
            &["parent"],
            Rc::clone(&child_calls),
            2,
        ))
        .unwrap();

        ctx.evaluate(&"child".into()).unwrap();
        let parent = ctx.graph().lookup(&"parent".into()).unwrap();
        assert_eq!(parent.status(), crate::dag::EvaluationStatus::Completed);
        assert_eq!(parent_calls.get(), 1);
        assert_eq!(child_calls.get(), 1);
    }

    #[test]
    fn failure_is_memoized_and_annotated() {
        let mut ctx = context();
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        ctx.register_bootstrapper(StateNode::from_fn("broken", vec![], move |_| {
            seen.set(seen.get() + 1);
            Err(PrimerError::ConfigError("boom".to_string()))
        }))
        .unwrap();

        match ctx.evaluate(&"broken".into()) {
            Err(PrimerError::EvaluationFailure { state, chain, source }) => {
                assert_eq!(state.as_str(), "broken");
                assert_eq!(chain, vec![StateId::from_static("broken")]);
                assert!(matches!(*source, PrimerError::ConfigError(_)));
            }
            Err(other) => panic!("expected EvaluationFailure, got {other:?}"),
            Ok(_) => panic!("expected failure"),
        }

        assert!(matches!(
            ctx.evaluate(&"broken".into()),
            Err(PrimerError::PreviouslyFailed { reason, .. }) if reason.contains("boom")
        ));
        assert_eq!(calls.get(), 1);

        let node = ctx.graph().lookup(&"broken".into()).unwrap();
        assert_eq!(node.status(), crate::dag::EvaluationStatus::Failed);
        assert!(node.failure_reason().unwrap().contains("boom"));
    }

    #[test]
    fn failure_chain_names_the_requesters() {
        let mut ctx = context();
        ctx.register_bootstrapper(StateNode::from_fn("leaf", vec![], |_| {
            Err(PrimerError::ConfigError("leaf broke".to_string()))
        }))
        .unwrap();
        ctx.register_bootstrapper(StateNode::from_fn("mid", vec!["leaf".into()], |ctx| {
            ctx.evaluate(&"leaf".into())
        }))
        .unwrap();

        match ctx.evaluate(&"mid".into()) {
            Err(PrimerError::EvaluationFailure { state, chain, .. }) => {
                assert_eq!(state.as_str(), "leaf");
                assert_eq!(
                    chain,
                    vec![StateId::from_static("mid"), StateId::from_static("leaf")]
                );
            }
            other => panic!("expected EvaluationFailure, got {:?}", other.err()),
        }
        assert_eq!(
            ctx.graph().lookup(&"mid".into()).unwrap().status(),
            crate::dag::EvaluationStatus::Failed
        );
    }

    #[test]
    fn mutual_requests_raise_cycle_detected() {
        let mut ctx = context();
        ctx.register_bootstrapper(StateNode::from_fn("a", vec!["b".into()], |ctx| {
            ctx.evaluate(&"b".into())
        }))
        .unwrap();
        ctx.register_bootstrapper(StateNode::from_fn("b", vec!["a".into()], |ctx| {
            ctx.evaluate(&"a".into())
        }))
        .unwrap();

        match ctx.evaluate(&"a".into()) {
            Err(PrimerError::CycleDetected { path }) => {
                let names: Vec<&str> = path.iter().map(StateId::as_str).collect();
                assert_eq!(names, vec!["a", "b", "a"]);
            }
            other => panic!("expected CycleDetected, got {:?}", other.err()),
        }

        // Memoized failures keep reporting the cycle.
        assert!(matches!(
            ctx.evaluate(&"b".into()),
            Err(PrimerError::CycleDetected { .. })
        ));
        for id in ["a", "b"] {
            let node = ctx.graph().lookup(&StateId::from_static(id)).unwrap();
            assert_eq!(node.status(), crate::dag::EvaluationStatus::Failed);
            assert!(node.cached_value().is_none());
        }
        assert!(ctx.request_chain().is_empty());
    }

    #[test]
    fn unknown_state_is_reported() {
        let ctx = context();
        assert!(matches!(
            ctx.evaluate(&"nope".into()),
            Err(PrimerError::UnknownState(id)) if id.as_str() == "nope"
        ));
    }

    #[test]
    fn wrong_value_type_is_reported() {
        let mut ctx = context();
        ctx.register_bootstrapper(StateNode::from_fn("text", vec![], |_| {
            Ok(state_value("hello".to_string()))
        }))
        .unwrap();
        assert!(matches!(
            ctx.evaluate_as::<i32>("text"),
            Err(PrimerError::ValueType { .. })
        ));
        assert_eq!(ctx.evaluate_as::<String>("text").unwrap(), "hello");
    }

    #[test]
    fn max_stride_only_decreases() {
        let ctx = context();
        assert_eq!(ctx.max_stride(), PyExec::Venv);
        ctx.set_max_stride(PyExec::Required);
        ctx.set_max_stride(PyExec::Venv);
        assert_eq!(ctx.max_stride(), PyExec::Required);
        ctx.set_max_stride(PyExec::Arbitrary);
        assert_eq!(ctx.max_stride(), PyExec::Arbitrary);
    }

    #[test]
    fn driver_is_fixed_at_construction() {
        let mut env = EnvSnapshot::default();
        env.set(USE_UV_VAR, "yes");
        let ctx = EvaluationContext::new(env.clone(), Box::new(RefusingBackend)).unwrap();
        env.set(USE_UV_VAR, "no");
        assert_eq!(ctx.package_driver(), PackageDriver::Uv);
        assert_eq!(ctx.env().get(USE_UV_VAR), Some("yes"));
    }

    #[test]
    fn final_state_overrides_sink_as_target() {
        let mut ctx = context();
        ctx.set_final_state("custom");
        assert_eq!(ctx.target_state().as_str(), "custom");
        ctx.set_universal_sink("other_sink");
        assert_eq!(ctx.target_state().as_str(), "custom");
    }

    #[test]
    fn status_lines() {
        assert_eq!(status_line(true), "SUCCESS");
        assert_eq!(status_line(false), "FAILURE");
    }
}
