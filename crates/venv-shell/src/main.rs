// src/main.rs

use std::process::ExitCode;

fn main() -> ExitCode {
    protoprimer::main_with(protoprimer_venv_shell::customize)
}
