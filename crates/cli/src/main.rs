//! webphone: terminal softphone for the webphone gateway

mod cli;
mod commands;
mod config;
mod logging;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing::Level;

use cli::{Cli, Command};
use config::AppConfig;
use logging::{parse_log_level, setup_logging, LoggingConfig};

#[tokio::main]
async fn main() {
    if let Err(e) = run(Cli::parse()).await {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    config.json_logs |= cli.json_logs;

    let level = parse_log_level(&config.log_level)?;
    let mut logging = LoggingConfig::new(level).with_json(config.json_logs);
    if level == Level::TRACE {
        logging = logging.with_file_info();
    }
    setup_logging(&logging)?;

    match cli.command.unwrap_or_default() {
        Command::Phone(args) => commands::phone::execute(args, config).await,
        Command::Token { ext, secret, ttl_secs } => {
            commands::token::sign(&config, &ext, secret.as_deref(), ttl_secs)
        }
        Command::Verify { token, secret } => commands::token::verify(&config, &token, secret.as_deref()),
    }
}
