use std::sync::Arc;

use clap::{Parser, Subcommand};
use constants::STARTUP_TIME;
use sqlx::{Pool, Sqlite};

use config::Config;

mod admin;
mod config;
mod constants;
mod error;
mod identity;
mod init;
mod models;
mod quotes;
mod ranking;
mod reactions;
mod routes;
mod selector;
mod telemetry;

#[derive(Clone)]
pub struct Data {
    pub db: Pool<Sqlite>,
    pub config: Arc<Config>,
}

#[derive(Parser)]
#[command(name = "quotebook", version)]
#[command(about = "serves weighted-random quotes and tracks visitor reactions")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// run the http server (default).
    Serve,
    /// manage quotes.
    #[command(subcommand)]
    Quote(admin::QuoteCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let _ = &*STARTUP_TIME;

    let cli = Cli::parse();
    let config = Config::load()?;

    let telemetry = telemetry::init_telemetry(&config)
        .map_err(|e| anyhow::anyhow!("failed to initialize telemetry: {e}"))?;
    config.log_defaults();

    let result = run(cli.command.unwrap_or(Command::Serve), config)
        .await
        .inspect_err(|e| tracing::error!(err = ?e, "quotebook exited with an error"));

    telemetry.shutdown();

    result
}

async fn run(command: Command, config: Config) -> anyhow::Result<()> {
    let data = init::init(config).await?;

    match command {
        Command::Serve => init::serve(data).await,
        Command::Quote(command) => admin::run(&data.db, command).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn startup_failure_is_returned_to_main() {
        let config = Config {
            database_url: "sqlite://quotebook-missing-dir/nested/quotebook.db".to_string(),
            ..Config::for_tests()
        };

        let result = run(Command::Quote(admin::QuoteCommand::List), config).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn admin_command_runs_against_the_store() {
        let result = run(Command::Quote(admin::QuoteCommand::List), Config::for_tests()).await;

        assert!(result.is_ok());
    }
}
