mod db;
mod draft;
mod offer;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::db::DbCommands;
use crate::draft::DraftCommands;
use crate::offer::OfferCommands;

#[derive(Debug, Parser)]
#[command(name = "partquote-cli")]
#[command(about = "Parts offer command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Inspect and drive offers through the API
    Offer {
        #[command(subcommand)]
        command: OfferCommands,
    },
    /// Local compose drafts
    Draft {
        #[command(subcommand)]
        command: DraftCommands,
    },
    /// Store API tokens for subsequent commands
    Login {
        #[arg(long, env = "PARTQUOTE_ACCESS_TOKEN", hide_env_values = true)]
        access_token: String,
        #[arg(long, env = "PARTQUOTE_REFRESH_TOKEN", hide_env_values = true)]
        refresh_token: Option<String>,
    },
    /// Remove stored API tokens
    Logout,
}

fn init_tracing() -> anyhow::Result<()> {
    let fallback = std::env::var("PARTQUOTE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(fallback))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Db { command }) => db::run(command).await?,
        Some(Commands::Offer { command }) => offer::run(command).await?,
        Some(Commands::Draft { command }) => draft::run(command).await?,
        Some(Commands::Login {
            access_token,
            refresh_token,
        }) => offer::run_login(access_token, refresh_token).await?,
        Some(Commands::Logout) => offer::run_logout().await?,
        None => println!("partquote-cli: run with --help for available commands"),
    }

    Ok(())
}
