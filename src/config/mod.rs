// src/config/mod.rs

//! Project configuration (`protoprimer.toml`).
//!
//! - `model.rs`: TOML-backed data model.
//! - `loader.rs`: locate and read the file.
//! - `validate.rs`: turn raw config into a validated [`ConfigFile`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{config_path, load_and_validate, load_for_env_dir, load_from_path};
pub use model::{
    CONFIG_FILE_NAME, ConfigFile, PackagesSection, ProjectSection, PythonSection, PythonSettings,
    RawConfigFile,
};
pub use validate::{MIN_PYTHON_VERSION, ensure_min_python_version};
