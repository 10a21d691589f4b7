mod db;
mod query;
mod token;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::db::DbCommands;

#[derive(Debug, Parser)]
#[command(name = "replyhound-cli")]
#[command(about = "replyhound operator command line interface")]
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
    /// List configured businesses
    Businesses,
    /// Show the most recent leads of a business
    Leads {
        /// Business id
        #[arg(long)]
        business: i64,
        /// Maximum number of leads to show
        #[arg(long, default_value = "20")]
        limit: i64,
    },
    /// Mint bookmarklet scan tokens for a chat
    Token {
        /// Telegram chat id the scans notify
        #[arg(long)]
        chat: String,
        /// Restrict to one business; defaults to all
        #[arg(long)]
        business: Option<i64>,
    },
    /// Delete expired rate-limit buckets
    Sweep,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("replyhound-cli: run with --help to list commands");
        return Ok(());
    };

    let config = replyhound_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = replyhound_db::PoolConfig::from_app_config(&config);
    let pool = replyhound_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db { command } => db::run_db(&pool, &config, &command).await,
        Commands::Businesses => query::run_businesses(&pool).await,
        Commands::Leads { business, limit } => query::run_leads(&pool, business, limit).await,
        Commands::Token { chat, business } => {
            token::run_token(&pool, &config, &chat, business).await
        }
        Commands::Sweep => db::run_sweep(&pool).await,
    }
}
