//! kstack CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Validation failure
//! - 5: IaC error

use std::process::ExitCode;

use clap::Parser;
use kstack_config::ConfigError;
use kstack_iac::IacError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const VALIDATION_FAILURE: u8 = 3;
    pub const IAC_ERROR: u8 = 5;
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_directives = if cli.verbose { "kstack=debug,info" } else { "kstack=info,warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));
    let log_result = tracing_subscriber::registry()
        .with(filter)
        .with(
            cli.log_json
                .then(|| fmt::layer().json().with_writer(std::io::stderr)),
        )
        .with(
            (!cli.log_json)
                .then(|| fmt::layer().with_target(false).with_writer(std::io::stderr)),
        )
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    let result = match cli.command {
        Commands::Validate(args) => commands::validate::execute(args, cli.quiet),
        Commands::Tags(args) => commands::tags::execute(args),
        Commands::Synth(args) => commands::synth::execute(args, cli.quiet),
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    if let Some(err) = e.downcast_ref::<IacError>() {
        return match err {
            IacError::Config(_) => ExitCodes::VALIDATION_FAILURE,
            _ => ExitCodes::IAC_ERROR,
        };
    }
    if let Some(err) = e.downcast_ref::<ConfigError>() {
        return match err {
            ConfigError::Io(_) | ConfigError::UnsupportedFormat(_) => ExitCodes::INVALID_ARGS,
            _ => ExitCodes::VALIDATION_FAILURE,
        };
    }

    let msg = e.to_string().to_lowercase();
    if msg.contains("argument") || msg.contains("not found") {
        ExitCodes::INVALID_ARGS
    } else {
        ExitCodes::GENERAL_ERROR
    }
}
