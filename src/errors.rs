// src/errors.rs

//! Crate-wide error type and helpers.

use thiserror::Error;

use crate::dag::StateId;

#[derive(Error, Debug)]
pub enum PrimerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A state's evaluator raised; `source` holds what it raised.
    #[error("evaluation of state `{state}` failed (request chain: {})", format_chain(.chain))]
    EvaluationFailure {
        state: StateId,
        chain: Vec<StateId>,
        #[source]
        source: Box<PrimerError>,
    },

    /// A state that already failed in this context was requested again.
    #[error("state `{state}` failed earlier in this run: {reason}")]
    PreviouslyFailed { state: StateId, reason: String },

    #[error("cycle detected in state graph: {}", format_chain(.path))]
    CycleDetected { path: Vec<StateId> },

    #[error("unknown state: {0}")]
    UnknownState(StateId),

    #[error("state already registered: {0}")]
    DuplicateState(StateId),

    #[error("state `{0}` does not implement evaluate_once")]
    NotImplemented(StateId),

    #[error("state `{state}` did not produce a value of type {expected}")]
    ValueType {
        state: StateId,
        expected: &'static str,
    },

    #[error("command `{command}` failed with exit code {}", format_code(.code))]
    SubprocessFailure { command: String, code: Option<i32> },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PrimerError {
    /// Errors that describe the graph itself rather than a single evaluator.
    ///
    /// These, and failures that already carry a state annotation, propagate
    /// through parent states unchanged.
    pub fn is_annotated(&self) -> bool {
        matches!(
            self,
            PrimerError::EvaluationFailure { .. }
                | PrimerError::PreviouslyFailed { .. }
                | PrimerError::CycleDetected { .. }
                | PrimerError::UnknownState(_)
        )
    }

    /// The innermost error, skipping `EvaluationFailure` wrappers.
    pub fn root_cause(&self) -> &PrimerError {
        let mut current = self;
        while let PrimerError::EvaluationFailure { source, .. } = current {
            current = source;
        }
        current
    }
}

fn format_chain(chain: &[StateId]) -> String {
    chain
        .iter()
        .map(StateId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn format_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "<signal>".to_string(),
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PrimerError>;
