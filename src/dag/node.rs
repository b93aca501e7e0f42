// src/dag/node.rs

//! A single vertex of the state graph and its memoizing evaluation.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::dag::bootstrapper::{Bootstrapper, FnBootstrapper, StateValue};
use crate::dag::{EvaluationContext, StateId};
use crate::errors::{PrimerError, Result};

/// Public, payload-free view of a node's evaluation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationStatus {
    Unstarted,
    InProgress,
    Completed,
    Failed,
}

impl EvaluationStatus {
    pub fn name(self) -> &'static str {
        match self {
            EvaluationStatus::Unstarted => "unstarted",
            EvaluationStatus::InProgress => "in_progress",
            EvaluationStatus::Completed => "completed",
            EvaluationStatus::Failed => "failed",
        }
    }
}

/// What a failed node remembers about its failure.
#[derive(Debug, Clone)]
enum FailureReason {
    Cycle(Vec<StateId>),
    Error(String),
}

impl FailureReason {
    fn from_error(err: &PrimerError) -> Self {
        match err.root_cause() {
            PrimerError::CycleDetected { path } => FailureReason::Cycle(path.clone()),
            cause => FailureReason::Error(cause.to_string()),
        }
    }

    fn reraise(&self, state: &StateId) -> PrimerError {
        match self {
            FailureReason::Cycle(path) => PrimerError::CycleDetected { path: path.clone() },
            FailureReason::Error(reason) => PrimerError::PreviouslyFailed {
                state: state.clone(),
                reason: reason.clone(),
            },
        }
    }
}

/// Internal status; `Completed` and `Failed` are terminal.
#[derive(Clone)]
enum Status {
    Unstarted,
    InProgress,
    Completed(StateValue),
    Failed(FailureReason),
}

pub struct StateNode {
    id: StateId,
    parents: Vec<StateId>,
    bootstrapper: Box<dyn Bootstrapper>,
    status: RefCell<Status>,
}

impl StateNode {
    pub fn new(
        id: impl Into<StateId>,
        parents: Vec<StateId>,
        bootstrapper: impl Bootstrapper + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            parents,
            bootstrapper: Box::new(bootstrapper),
            status: RefCell::new(Status::Unstarted),
        }
    }

    /// Convenience constructor for closure-backed states.
    pub fn from_fn<F>(id: impl Into<StateId>, parents: Vec<StateId>, f: F) -> Self
    where
        F: Fn(&EvaluationContext) -> Result<StateValue> + 'static,
    {
        Self::new(id, parents, FnBootstrapper::new(f))
    }

    pub fn id(&self) -> &StateId {
        &self.id
    }

    /// Declared parents. Advisory: used for traversal and validation only.
    pub fn parents(&self) -> &[StateId] {
        &self.parents
    }

    pub fn status(&self) -> EvaluationStatus {
        match &*self.status.borrow() {
            Status::Unstarted => EvaluationStatus::Unstarted,
            Status::InProgress => EvaluationStatus::InProgress,
            Status::Completed(_) => EvaluationStatus::Completed,
            Status::Failed(_) => EvaluationStatus::Failed,
        }
    }

    pub fn cached_value(&self) -> Option<StateValue> {
        match &*self.status.borrow() {
            Status::Completed(value) => Some(Rc::clone(value)),
            _ => None,
        }
    }

    pub fn failure_reason(&self) -> Option<String> {
        match &*self.status.borrow() {
            Status::Failed(FailureReason::Error(reason)) => Some(reason.clone()),
            Status::Failed(FailureReason::Cycle(path)) => Some(
                PrimerError::CycleDetected { path: path.clone() }.to_string(),
            ),
            _ => None,
        }
    }

    /// Return the memoized value, computing it on first use.
    ///
    /// Re-entering a node that is still in progress means the request chain
    /// looped back on itself. A failed node stays failed for the life of the
    /// context and re-raises without running its evaluator again.
    pub fn evaluate(&self, ctx: &EvaluationContext) -> Result<StateValue> {
        match &*self.status.borrow() {
            Status::Completed(value) => {
                trace!(state = %self.id, "returning memoized value");
                return Ok(Rc::clone(value));
            }
            Status::InProgress => {
                return Err(PrimerError::CycleDetected {
                    path: ctx.cycle_path(&self.id),
                });
            }
            Status::Failed(reason) => return Err(reason.reraise(&self.id)),
            Status::Unstarted => {}
        }

        *self.status.borrow_mut() = Status::InProgress;
        debug!(state = %self.id, "evaluating state");

        match self.evaluate_bootstrapper(ctx) {
            Ok(value) => {
                *self.status.borrow_mut() = Status::Completed(Rc::clone(&value));
                debug!(state = %self.id, "state completed");
                Ok(value)
            }
            Err(err) => {
                let err = if err.is_annotated() {
                    err
                } else {
                    PrimerError::EvaluationFailure {
                        state: self.id.clone(),
                        chain: ctx.request_chain(),
                        source: Box::new(err),
                    }
                };
                *self.status.borrow_mut() = Status::Failed(FailureReason::from_error(&err));
                debug!(state = %self.id, error = %err, "state failed");
                Err(err)
            }
        }
    }

    fn evaluate_bootstrapper(&self, ctx: &EvaluationContext) -> Result<StateValue> {
        self.bootstrapper.pre_evaluate(&self.id, ctx)?;
        let value = self.bootstrapper.evaluate_once(&self.id, ctx)?;
        self.bootstrapper.post_evaluate(&self.id, ctx, &value)?;
        Ok(value)
    }
}

impl fmt::Debug for StateNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateNode")
            .field("id", &self.id)
            .field("parents", &self.parents)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
