// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod states;
pub mod types;

use std::error::Error as _;
use std::io::Write;
use std::process::ExitCode;

use tracing::info;

use crate::cli::ParsedArgs;
use crate::dag::{EvaluationContext, RunStrategy, StateId};
use crate::errors::{PrimerError, Result};

/// High-level entry point used by every protoprimer binary.
///
/// `customize` receives the kernel context and returns the one to run,
/// which lets an extension register or replace states and pick its own
/// `final_state`. Arguments are parsed first so logging is configured
/// before anything else happens.
pub fn main_with<F>(customize: F) -> ExitCode
where
    F: FnOnce(EvaluationContext) -> Result<EvaluationContext>,
{
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.verbose) {
        eprintln!("protoprimer: {err:#}");
    }

    let mut ctx = match EvaluationContext::from_process_env().and_then(customize) {
        Ok(ctx) => ctx,
        Err(err) => {
            print_error_chain(&err);
            eprintln!("{}", dag::status_line(false));
            return ExitCode::FAILURE;
        }
    };

    let result = {
        let mut stdout = std::io::stdout().lock();
        run(&mut ctx, args, &mut stdout)
    };

    match result {
        Ok(code) => {
            ctx.report_success_status(code == 0);
            exit_code(code)
        }
        Err(err) => {
            print_error_chain(&err);
            ctx.report_success_status(false);
            ExitCode::FAILURE
        }
    }
}

/// Apply `args` to `ctx` and execute its run strategy.
///
/// Returns the exit code the strategy produced. Only `GraphPrinter`
/// writes to `out`.
pub fn run(ctx: &mut EvaluationContext, args: ParsedArgs, out: &mut dyn Write) -> Result<i32> {
    if let Some(stride) = args.py_exec {
        ctx.set_max_stride(stride);
    }
    if ctx.final_state().is_none() {
        if let Some(name) = &args.final_state {
            ctx.set_final_state(StateId::new(name.clone()));
        }
    }
    if args.print_graph {
        ctx.set_run_strategy(RunStrategy::GraphPrinter);
    }
    ctx.set_parsed_args(args);

    let strategy = ctx.run_strategy();
    let target = ctx.target_state().clone();
    if strategy == RunStrategy::ExitCodeReporter {
        ctx.graph().validate_from(&target)?;
    }

    info!(?strategy, target = %target, max_stride = %ctx.max_stride(), "starting run");
    strategy.execute(ctx, &target, out)
}

fn exit_code(code: i32) -> ExitCode {
    match u8::try_from(code) {
        Ok(code) => ExitCode::from(code),
        Err(_) => ExitCode::FAILURE,
    }
}

fn print_error_chain(err: &PrimerError) {
    eprintln!("protoprimer error: {err}");
    let mut source = err.source();
    while let Some(cause) = source {
        eprintln!("  caused by: {cause}");
        source = cause.source();
    }
}
