mod cli;
mod commands;
mod error;
mod logging;
mod output;

use clap::Parser;
use std::process::ExitCode;

use marketlens_core::{MarketDataService, Settings, Toolbox};

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, CliError> {
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.log_json);

    let settings = Settings::load(cli.config.as_deref())?;
    let toolbox = Toolbox::new(MarketDataService::from_settings(settings)?);

    commands::run(&cli, &toolbox).await
}
