// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

use crate::types::PyExec;

/// Command-line arguments shared by every protoprimer driver.
///
/// Repeated options keep the last occurrence (`--env a --env b` is `--env b`).
#[derive(Debug, Clone, Parser)]
#[command(
    name = "protoprimer",
    version,
    about = "Bring a repository's local toolchain from any state to fully provisioned.",
    long_about = None,
    args_override_self = true,
    help_template = "{about-with-newline}\nusage: {usage}\n\n{all-args}{after-help}"
)]
pub struct CliArgs {
    /// What to do.
    #[arg(value_enum, default_value_t = RunMode::Prime)]
    pub command: RunMode,

    /// Directory holding `protoprimer.toml`.
    ///
    /// Default: the current working directory.
    #[arg(long = "env", value_name = "DIR")]
    pub env: Option<PathBuf>,

    /// Furthest interpreter stride the bootstrap may advance to.
    #[arg(long = "py-exec", value_enum, value_name = "STRIDE")]
    pub py_exec: Option<PyExec>,

    /// Raise log verbosity (repeatable).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Print the state dependency tree instead of evaluating it.
    #[arg(long)]
    pub print_graph: bool,

    /// Evaluate this state instead of the default target.
    #[arg(long, value_name = "STATE")]
    pub final_state: Option<String>,
}

/// Positional subcommand.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum RunMode {
    /// Bootstrap the environment (default).
    Prime,
}

/// Parsed arguments as stored on the evaluation context.
pub type ParsedArgs = CliArgs;

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

/// Parse an explicit argument list (first item is the program name).
pub fn parse_from<I, T>(args: I) -> Result<CliArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    CliArgs::try_parse_from(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_prime() {
        let args = CliArgs::try_parse_from(["protoprimer"]).unwrap();
        assert_eq!(args.command, RunMode::Prime);
        assert_eq!(args.env, None);
        assert_eq!(args.py_exec, None);
        assert_eq!(args.verbose, 0);
        assert!(!args.print_graph);
    }

    #[test]
    fn repeated_options_last_wins() {
        let args = CliArgs::try_parse_from([
            "protoprimer",
            "--py-exec",
            "arbitrary",
            "--py-exec",
            "required",
            "--py-exec",
            "venv",
            "--env",
            "x",
            "--env",
            "y",
            "--env",
            "z",
        ])
        .unwrap();
        assert_eq!(args.py_exec, Some(PyExec::Venv));
        assert_eq!(args.env, Some(PathBuf::from("z")));
    }

    #[test]
    fn verbosity_counts() {
        let args = CliArgs::try_parse_from(["protoprimer", "-vv", "prime", "-v"]).unwrap();
        assert_eq!(args.verbose, 3);
    }

    #[test]
    fn unknown_stride_is_rejected() {
        assert!(CliArgs::try_parse_from(["protoprimer", "--py-exec", "unknown"]).is_err());
    }

    #[test]
    fn unknown_flag_is_rejected() {
        let err = CliArgs::try_parse_from(["protoprimer", "--invalid-arg", "some_value"])
            .unwrap_err();
        assert!(err.to_string().contains("error"));
    }

    #[test]
    fn help_uses_lowercase_usage_heading() {
        let err = CliArgs::try_parse_from(["protoprimer", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
        assert!(err.to_string().contains("usage: "));
    }
}
