// src/main.rs

use std::process::ExitCode;

fn main() -> ExitCode {
    protoprimer::main_with(Ok)
}
