pub mod builders;
pub mod fake_process;

use std::sync::Once;
use tracing_subscriber::{fmt, EnvFilter};

use protoprimer::dag::{EnvSnapshot, EvaluationContext};

pub use builders::{ConfigBuilder, StubState};
pub use fake_process::{FAKE_REEXEC_MESSAGE, FakeProcessBackend};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Build an environment snapshot from literal pairs.
pub fn env_snapshot(pairs: &[(&str, &str)]) -> EnvSnapshot {
    EnvSnapshot::from_pairs(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string())),
    )
}

/// A kernel context over `env` whose processes go to `backend`.
pub fn fake_context(env: &[(&str, &str)], backend: &FakeProcessBackend) -> EvaluationContext {
    EvaluationContext::new(env_snapshot(env), Box::new(backend.clone()))
        .expect("failed to build evaluation context")
}
