use anyhow::Result;
use std::process::ExitCode;

fn main() -> Result<ExitCode> {
    reconcile_cli::main_entry()
}
