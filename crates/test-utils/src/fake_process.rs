use std::cell::RefCell;
use std::convert::Infallible;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use protoprimer::errors::{PrimerError, Result};
use protoprimer::exec::driver::PYVENV_CFG;
use protoprimer::exec::{CommandOutput, CommandSpec, ProcessBackend};

/// Error text returned from every simulated re-exec.
pub const FAKE_REEXEC_MESSAGE: &str = "fake backend: re-exec requested";

/// A fake process backend that:
/// - records every command and re-exec request
/// - answers `--version` queries with a configurable version
/// - simulates `python -m venv` and `uv venv` by writing `pyvenv.cfg`
/// - reports installs as successful unless told otherwise.
///
/// Clones share their records, so a test keeps one handle and moves another
/// into the context.
#[derive(Clone)]
pub struct FakeProcessBackend {
    inner: Rc<RefCell<Inner>>,
}

struct Inner {
    python_version: String,
    failing_packages: Vec<String>,
    commands: Vec<CommandSpec>,
    reexecs: Vec<CommandSpec>,
}

impl FakeProcessBackend {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                python_version: "3.11.4".to_string(),
                failing_packages: vec![],
                commands: vec![],
                reexecs: vec![],
            })),
        }
    }

    pub fn with_python_version(self, version: &str) -> Self {
        self.inner.borrow_mut().python_version = version.to_string();
        self
    }

    /// Make installing `package` exit with code 1.
    pub fn failing_install(self, package: &str) -> Self {
        self.inner.borrow_mut().failing_packages.push(package.to_string());
        self
    }

    pub fn commands(&self) -> Vec<CommandSpec> {
        self.inner.borrow().commands.clone()
    }

    pub fn reexecs(&self) -> Vec<CommandSpec> {
        self.inner.borrow().reexecs.clone()
    }

    /// Package specs passed to install commands, in order.
    pub fn installed_packages(&self) -> Vec<String> {
        self.commands()
            .iter()
            .filter(|spec| is_install(spec))
            .filter_map(|spec| spec.args.last().cloned())
            .collect()
    }

    /// Venv directories created so far.
    pub fn created_venvs(&self) -> Vec<PathBuf> {
        self.commands()
            .iter()
            .filter_map(venv_target)
            .collect()
    }

    fn create_venv(&self, dir: &Path, uv: bool) -> std::io::Result<()> {
        fs::create_dir_all(dir.join("bin"))?;
        let version = self.inner.borrow().python_version.clone();
        let mut cfg = format!("home = /usr/bin\ninclude-system-site-packages = false\nversion = {version}\n");
        if uv {
            cfg.push_str("uv = 0.4.18\n");
        }
        fs::write(dir.join(PYVENV_CFG), cfg)
    }
}

impl Default for FakeProcessBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn is_uv(spec: &CommandSpec) -> bool {
    spec.program_name() == "uv"
}

fn is_install(spec: &CommandSpec) -> bool {
    spec.args.iter().any(|arg| arg == "install")
}

fn venv_target(spec: &CommandSpec) -> Option<PathBuf> {
    let args: Vec<&str> = spec.args.iter().map(String::as_str).collect();
    match args.as_slice() {
        ["-m", "venv", dir] => Some(PathBuf::from(*dir)),
        ["venv", "--python", _, dir] if is_uv(spec) => Some(PathBuf::from(*dir)),
        _ => None,
    }
}

impl ProcessBackend for FakeProcessBackend {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.inner.borrow_mut().commands.push(spec.clone());

        if spec.args == ["--version"] {
            let version = self.inner.borrow().python_version.clone();
            return Ok(CommandOutput {
                code: Some(0),
                stdout: format!("Python {version}\n"),
                stderr: String::new(),
            });
        }

        if let Some(dir) = venv_target(spec) {
            self.create_venv(&dir, is_uv(spec))?;
            return Ok(CommandOutput {
                code: Some(0),
                ..CommandOutput::default()
            });
        }

        if is_install(spec) {
            let package = spec.args.last().cloned().unwrap_or_default();
            let failing = self.inner.borrow().failing_packages.contains(&package);
            return Ok(CommandOutput {
                code: Some(if failing { 1 } else { 0 }),
                stdout: String::new(),
                stderr: if failing {
                    format!("ERROR: No matching distribution found for {package}\n")
                } else {
                    String::new()
                },
            });
        }

        Ok(CommandOutput {
            code: Some(0),
            ..CommandOutput::default()
        })
    }

    fn reexec(&self, spec: &CommandSpec) -> Result<Infallible> {
        self.inner.borrow_mut().reexecs.push(spec.clone());
        Err(PrimerError::Other(anyhow::anyhow!("{FAKE_REEXEC_MESSAGE}: {spec}")))
    }
}
