//! cmdgate - prefix-command chat bot with arbitrated terminal and web login.

use clap::Parser;
use std::process::ExitCode;

use cmdgate::cli::Commands;
use cmdgate::logging;

#[tokio::main]
async fn main() -> ExitCode {
    // .env must be in the environment before clap reads env-backed flags.
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to load .env: {}", e);
            return ExitCode::FAILURE;
        }
    }

    let _guard = match logging::init() {
        Ok((guard, _)) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let args = Commands::parse();

    match args.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
