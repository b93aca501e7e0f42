#![allow(dead_code)]

use std::path::Path;

use protoprimer::cli::{ParsedArgs, parse_from};

pub use protoprimer_test_utils::init_tracing;

/// Arguments for `protoprimer prime --env <dir>` plus `extra`.
pub fn prime_args(env_dir: &Path, extra: &[&str]) -> ParsedArgs {
    let env_dir = env_dir.to_string_lossy().into_owned();
    let mut argv = vec!["protoprimer", "prime", "--env", env_dir.as_str()];
    argv.extend_from_slice(extra);
    parse_from(argv).expect("valid test arguments")
}
