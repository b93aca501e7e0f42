// src/exec/mod.rs

//! Process execution layer.
//!
//! States run external tools (interpreters, package managers, shells)
//! through the [`ProcessBackend`] held by the evaluation context.
//!
//! - [`backend`] provides the `ProcessBackend` trait, the command/output
//!   types, and the `RealProcessBackend` used in production.
//! - [`process`] runs one command with `tokio::process` and handles re-exec.
//! - [`driver`] holds the `pip`/`uv` package drivers and venv helpers.

pub mod backend;
pub mod driver;
pub mod process;

pub use backend::{CommandOutput, CommandSpec, ProcessBackend, RealProcessBackend};
pub use driver::{PackageDriver, VenvLayout, detect_venv_driver};
