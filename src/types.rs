use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use regex::Regex;

use crate::errors::{PrimerError, Result};

/// Coarse category of the interpreter the bootstrap is currently running under.
///
/// Ordered: each stride is a strict step beyond the previous one, so the
/// derived `Ord` doubles as "how far along" the bootstrap is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
pub enum PyExec {
    /// Nothing is known yet (no `PROTOPRIMER_PY_EXEC` in the environment).
    #[value(skip)]
    Unknown,
    /// Whatever interpreter happened to start the primer.
    Arbitrary,
    /// The interpreter selected and verified by configuration.
    Required,
    /// The interpreter inside the project venv.
    Venv,
}

impl PyExec {
    /// Short name used on the CLI and in log lines.
    pub fn name(self) -> &'static str {
        match self {
            PyExec::Unknown => "unknown",
            PyExec::Arbitrary => "arbitrary",
            PyExec::Required => "required",
            PyExec::Venv => "venv",
        }
    }

    /// Value carried in `PROTOPRIMER_PY_EXEC` across a re-exec.
    pub fn env_value(self) -> &'static str {
        match self {
            PyExec::Unknown => "stride_py_unknown",
            PyExec::Arbitrary => "stride_py_arbitrary",
            PyExec::Required => "stride_py_required",
            PyExec::Venv => "stride_py_venv",
        }
    }

    /// Parse the `PROTOPRIMER_PY_EXEC` value; absent means `Unknown`.
    pub fn from_env_value(value: Option<&str>) -> Result<Self> {
        let Some(value) = value else {
            return Ok(PyExec::Unknown);
        };
        match value.trim() {
            "" | "stride_py_unknown" => Ok(PyExec::Unknown),
            "stride_py_arbitrary" => Ok(PyExec::Arbitrary),
            "stride_py_required" => Ok(PyExec::Required),
            "stride_py_venv" => Ok(PyExec::Venv),
            other => Err(PrimerError::ConfigError(format!(
                "invalid {PY_EXEC_VAR} value: {other:?} (expected one of \
                 stride_py_arbitrary, stride_py_required, stride_py_venv)"
            ))),
        }
    }
}

impl fmt::Display for PyExec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PyExec {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "unknown" => Ok(PyExec::Unknown),
            "arbitrary" => Ok(PyExec::Arbitrary),
            "required" => Ok(PyExec::Required),
            "venv" => Ok(PyExec::Venv),
            other => Err(format!(
                "invalid py exec stride: {other} (expected \"arbitrary\", \"required\" or \"venv\")"
            )),
        }
    }
}

/// Environment variable selecting the `uv` package driver.
pub const USE_UV_VAR: &str = "PROTOPRIMER_USE_UV";

/// Environment variable carrying the current stride across re-execs.
pub const PY_EXEC_VAR: &str = "PROTOPRIMER_PY_EXEC";

/// Parse a boolean-like string.
///
/// Accepts `true`/`t`/`yes`/`y`/`1` and `false`/`f`/`no`/`n`/`0` in any case.
pub fn str_to_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Ok(true),
        "false" | "f" | "no" | "n" | "0" => Ok(false),
        _ => Err(PrimerError::ConfigError(format!(
            "invalid boolean-like value: {value:?}"
        ))),
    }
}

/// A Python interpreter version, compared component-wise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PythonVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl PythonVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Extract the version from `python --version` output (`Python 3.11.4`).
    pub fn from_version_output(output: &str) -> Result<Self> {
        let pattern = Regex::new(r"Python\s+(\d+)\.(\d+)(?:\.(\d+))?").map_err(anyhow::Error::from)?;
        let caps = pattern.captures(output).ok_or_else(|| {
            PrimerError::ConfigError(format!(
                "cannot find a python version in output: {:?}",
                output.trim()
            ))
        })?;
        let part = |i: usize| -> Result<u32> {
            match caps.get(i) {
                Some(m) => m.as_str().parse::<u32>().map_err(|e| {
                    PrimerError::ConfigError(format!("invalid version component {:?}: {e}", m.as_str()))
                }),
                None => Ok(0),
            }
        };
        Ok(Self::new(part(1)?, part(2)?, part(3)?))
    }
}

impl fmt::Display for PythonVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for PythonVersion {
    type Err = String;

    /// Parse `X.Y` or `X.Y.Z`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if !(2..=3).contains(&parts.len()) {
            return Err(format!("invalid python version: {s:?} (expected X.Y or X.Y.Z)"));
        }
        let mut numbers = [0u32; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| format!("invalid python version: {s:?} (expected X.Y or X.Y.Z)"))?;
        }
        Ok(Self::new(numbers[0], numbers[1], numbers[2]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strides_are_ordered() {
        assert!(PyExec::Unknown < PyExec::Arbitrary);
        assert!(PyExec::Arbitrary < PyExec::Required);
        assert!(PyExec::Required < PyExec::Venv);
    }

    #[test]
    fn env_value_parsing() {
        assert_eq!(PyExec::from_env_value(None).unwrap(), PyExec::Unknown);
        assert_eq!(
            PyExec::from_env_value(Some("stride_py_arbitrary")).unwrap(),
            PyExec::Arbitrary
        );
        for stride in [PyExec::Arbitrary, PyExec::Required, PyExec::Venv] {
            assert_eq!(PyExec::from_env_value(Some(stride.env_value())).unwrap(), stride);
        }
        assert!(matches!(
            PyExec::from_env_value(Some("py_whatever")),
            Err(PrimerError::ConfigError(_))
        ));
    }

    #[test]
    fn python_version_parsing() {
        assert_eq!("3.8".parse::<PythonVersion>().unwrap(), PythonVersion::new(3, 8, 0));
        assert_eq!("3.11.4".parse::<PythonVersion>().unwrap(), PythonVersion::new(3, 11, 4));
        assert!("3".parse::<PythonVersion>().is_err());
        assert!("3.x.1".parse::<PythonVersion>().is_err());
        assert!("3.8.0.1".parse::<PythonVersion>().is_err());

        assert_eq!(
            PythonVersion::from_version_output("Python 3.12.1\n").unwrap(),
            PythonVersion::new(3, 12, 1)
        );
        assert!(PythonVersion::from_version_output("command not found").is_err());
        assert!(PythonVersion::new(3, 7, 5) < PythonVersion::new(3, 8, 0));
        assert!(PythonVersion::new(3, 10, 0) > PythonVersion::new(3, 9, 18));
    }

    #[test]
    fn str_to_bool_rejects_garbage() {
        assert!(str_to_bool("True").unwrap());
        assert!(!str_to_bool("n").unwrap());
        assert!(str_to_bool("maybe").is_err());
        assert!(str_to_bool("").is_err());
    }
}
