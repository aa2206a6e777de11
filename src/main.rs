use clap::{Parser, Subcommand};
use tracing::warn;

mod cli;
mod config;
mod core;
mod error;
mod services;
mod utils;

use cli::{cache, crypt, fetch, search};
use config::Config;
use services::Services;

#[derive(Parser)]
#[command(name = "lyricsync")]
#[command(about = "Find, decrypt and normalize time-synced lyrics from multiple music platforms")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (optional)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find the best lyrics for a song across all providers
    Match(search::MatchArgs),

    /// Fetch and normalize lyrics for a known provider song id
    Fetch(fetch::FetchArgs),

    /// Decrypt a QRC, KRC or EAPI payload
    Decrypt(crypt::CryptArgs),

    /// Encrypt plaintext into a QRC or KRC payload
    Encrypt(crypt::CryptArgs),

    /// Manage the lyrics cache
    Cache(cache::CacheArgs),

    /// Show configuration
    Config(cli::config::ConfigArgs),
}

async fn run(command: Commands, services: &Services) -> anyhow::Result<()> {
    match command {
        Commands::Match(args) => search::execute(args, services).await,
        Commands::Fetch(args) => fetch::execute(args, services).await,
        Commands::Decrypt(args) => crypt::execute_decrypt(args).await,
        Commands::Encrypt(args) => crypt::execute_encrypt(args).await,
        Commands::Cache(args) => cache::execute(args, services).await,
        Commands::Config(args) => cli::config::execute(args, &services.config()).await,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    utils::logging::init_logging(cli.verbose);

    let config = Config::load(cli.config.as_deref())?;
    let services = Services::new(config);

    tokio::select! {
        result = run(cli.command, &services) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted");
            std::process::exit(130);
        }
    }
}
