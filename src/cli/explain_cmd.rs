//! Handler for the `stabcheck explain` subcommand.

use std::process::ExitCode;

use crate::diagnostics::{explain, ALL_CODES};

use super::CliError;

pub(super) fn run_explain(code: &str) -> Result<ExitCode, CliError> {
    match explain(code) {
        Some(text) => {
            println!("{}", text);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("Valid codes: {}", ALL_CODES.join(", "));
            Err(CliError::UnknownCode(code.to_string()))
        }
    }
}
