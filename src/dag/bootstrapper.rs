// src/dag/bootstrapper.rs

//! The contract every state implementation satisfies.
//!
//! A [`Bootstrapper`] only supplies the single-shot work. Memoization, status
//! transitions and failure annotation live in [`StateNode::evaluate`] and are
//! shared by every implementation.
//!
//! [`StateNode::evaluate`]: crate::dag::StateNode::evaluate

use std::any::Any;
use std::rc::Rc;

use crate::dag::{EvaluationContext, StateId};
use crate::errors::{PrimerError, Result};

/// Memoized value of a state. Its concrete type is chosen by the state.
pub type StateValue = Rc<dyn Any>;

/// Wrap a concrete value as a [`StateValue`].
pub fn state_value<T: 'static>(value: T) -> StateValue {
    Rc::new(value)
}

pub trait Bootstrapper {
    /// Compute this state's value once.
    ///
    /// Parents are not evaluated up front: an implementation asks the context
    /// for the ones it needs via [`EvaluationContext::evaluate`].
    fn evaluate_once(&self, state: &StateId, ctx: &EvaluationContext) -> Result<StateValue> {
        let _ = ctx;
        Err(PrimerError::NotImplemented(state.clone()))
    }

    /// Runs right before `evaluate_once`.
    fn pre_evaluate(&self, _state: &StateId, _ctx: &EvaluationContext) -> Result<()> {
        Ok(())
    }

    /// Runs after a successful `evaluate_once`, before the value is stored.
    fn post_evaluate(
        &self,
        _state: &StateId,
        _ctx: &EvaluationContext,
        _value: &StateValue,
    ) -> Result<()> {
        Ok(())
    }
}

/// Bootstrapper backed by a closure.
pub struct FnBootstrapper<F>(F);

impl<F> FnBootstrapper<F>
where
    F: Fn(&EvaluationContext) -> Result<StateValue>,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> Bootstrapper for FnBootstrapper<F>
where
    F: Fn(&EvaluationContext) -> Result<StateValue>,
{
    fn evaluate_once(&self, _state: &StateId, ctx: &EvaluationContext) -> Result<StateValue> {
        (self.0)(ctx)
    }
}
