//! nsmeta CLI Binary
//!
//! Command-line interface for the namespace directory index.

use clap::Parser;
use nsmeta::logging::init_logging;
use nsmeta::tooling::cli::{Cli, CliContext};
use std::process;

fn main() {
    let cli = Cli::parse();

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = init_logging(Some(&config.logging)) {
        eprintln!("Error initializing logging: {}", e);
        process::exit(1);
    }

    let context = match CliContext::from_config(config, &cli) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error opening namespace store: {}", e);
            process::exit(1);
        }
    };

    match context.execute(&cli.command) {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(if e.is_client_error() { 2 } else { 1 });
        }
    }
}
