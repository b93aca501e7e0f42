use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use protoprimer::config::{CONFIG_FILE_NAME, ConfigFile, RawConfigFile};
use protoprimer::dag::{Bootstrapper, EvaluationContext, StateId, StateNode, StateValue, state_value};
use protoprimer::errors::Result;

/// Builder for `protoprimer.toml` contents to simplify test setup.
pub struct ConfigBuilder {
    config: RawConfigFile,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn python_exec(mut self, exec: &str) -> Self {
        self.config.python.exec = exec.to_string();
        self
    }

    pub fn min_version(mut self, version: &str) -> Self {
        self.config.python.min_version = version.to_string();
        self
    }

    pub fn venv_dir(mut self, dir: &str) -> Self {
        self.config.project.venv_dir = PathBuf::from(dir);
        self
    }

    pub fn cache_dir(mut self, dir: &str) -> Self {
        self.config.project.cache_dir = PathBuf::from(dir);
        self
    }

    pub fn package(mut self, spec: &str) -> Self {
        self.config.packages.install.push(spec.to_string());
        self
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> String {
        let packages: Vec<String> = self
            .config
            .packages
            .install
            .iter()
            .map(|p| format!("{p:?}"))
            .collect();
        format!(
            "[python]\nexec = {:?}\nmin_version = {:?}\n\n\
             [project]\nvenv_dir = {:?}\ncache_dir = {:?}\n\n\
             [packages]\ninstall = [{}]\n",
            self.config.python.exec,
            self.config.python.min_version,
            self.config.project.venv_dir.to_string_lossy(),
            self.config.project.cache_dir.to_string_lossy(),
            packages.join(", "),
        )
    }

    /// Write `protoprimer.toml` into `dir` and return its path.
    pub fn write_to(&self, dir: &Path) -> PathBuf {
        let path = dir.join(CONFIG_FILE_NAME);
        fs::write(&path, self.to_toml()).expect("Failed to write protoprimer.toml");
        path
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A state returning a fixed `i32` and counting how often it ran.
///
/// It requests each of its parents before returning.
#[derive(Clone)]
pub struct StubState {
    value: i32,
    parents: Vec<StateId>,
    calls: Rc<Cell<u32>>,
}

impl StubState {
    pub fn new(value: i32) -> Self {
        Self {
            value,
            parents: vec![],
            calls: Rc::new(Cell::new(0)),
        }
    }

    pub fn parent(mut self, id: impl Into<StateId>) -> Self {
        self.parents.push(id.into());
        self
    }

    /// Shared call counter; stays valid after the stub moved into a graph.
    pub fn calls(&self) -> Rc<Cell<u32>> {
        Rc::clone(&self.calls)
    }

    pub fn into_node(self, id: impl Into<StateId>) -> StateNode {
        let parents = self.parents.clone();
        StateNode::new(id, parents, self)
    }
}

impl Bootstrapper for StubState {
    fn evaluate_once(&self, _state: &StateId, ctx: &EvaluationContext) -> Result<StateValue> {
        self.calls.set(self.calls.get() + 1);
        for parent in &self.parents {
            ctx.evaluate(parent)?;
        }
        Ok(state_value(self.value))
    }
}
