//! Infuse CLI Binary
//!
//! Loads paths from a JSON fixture through the engine, for trying out resolver
//! behavior and configuration from the command line.

use clap::Parser;
use infuse::cli::{Cli, RunContext};
use infuse::config::{ConfigLoader, InfuseConfig};
use infuse::logging::init_logging;
use std::process;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    if let Err(e) = init_logging(Some(&config.logging)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!("Infuse CLI starting");

    let context = RunContext::new(config);
    match context.execute(&cli.command).await {
        Ok(output) => {
            info!("Command completed successfully");
            println!("{}", output);
        }
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}

/// Layered configuration with CLI flags applied last
fn load_config(cli: &Cli) -> Result<InfuseConfig, infuse::LoadError> {
    let mut config = ConfigLoader::load(cli.config.as_deref())?;
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.logging.format = format.clone();
    }
    config.ensure_valid()?;
    Ok(config)
}
