mod cli;
mod commands;
mod config;
mod error;
mod logging;
mod progress;

use crate::cli::{Cli, Commands};
use crate::error::Result;
use clap::Parser;
use tracing::{debug, error, info};

fn main() {
    if let Err(e) = run_app() {
        eprintln!("\n❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn run_app() -> Result<()> {
    let cli = Cli::parse();
    logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.clone())?;

    info!("🚀 ATOMICA CLI v{} starting up.", env!("CARGO_PKG_VERSION"));
    debug!("Full CLI arguments parsed: {:?}", &cli);

    let quiet = cli.quiet;
    let command_result = match cli.command {
        Commands::Process(args) => commands::process::run(args, quiet),
        Commands::Init(args) => commands::init::run(args),
        Commands::Predict(args) => commands::predict::run(args, quiet),
    };

    match &command_result {
        Ok(_) => info!("✅ Command completed successfully."),
        Err(e) => error!("Command failed: {}", e),
    }
    command_result
}
