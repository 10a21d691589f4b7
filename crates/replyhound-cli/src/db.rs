//! Database maintenance commands.

use chrono::Utc;
use clap::Subcommand;
use replyhound_core::AppConfig;
use sqlx::PgPool;

/// Sub-commands available under `db`.
#[derive(Debug, Subcommand)]
pub enum DbCommands {
    /// Check that the database answers
    Ping,
    /// Apply pending migrations
    Migrate,
    /// Upsert businesses and campaigns from the seed file
    Seed,
}

pub(crate) async fn run_db(
    pool: &PgPool,
    config: &AppConfig,
    command: &DbCommands,
) -> anyhow::Result<()> {
    match command {
        DbCommands::Ping => {
            replyhound_db::health_check(pool).await?;
            println!("database ok");
        }
        DbCommands::Migrate => {
            let applied = replyhound_db::run_migrations(pool).await?;
            println!("migrations applied ({applied} total)");
        }
        DbCommands::Seed => run_seed(pool, config).await?,
    }
    Ok(())
}

/// Load the businesses file named by `REPLYHOUND_BUSINESSES_PATH` and upsert
/// it.
///
/// # Errors
///
/// Returns an error if the file is missing or invalid, or the upsert fails.
async fn run_seed(pool: &PgPool, config: &AppConfig) -> anyhow::Result<()> {
    let file = replyhound_core::load_businesses(&config.businesses_path)?;
    let count = replyhound_db::seed_businesses(pool, &file.businesses).await?;
    tracing::info!(count, path = %config.businesses_path.display(), "seeded businesses");
    println!(
        "seeded {count} businesses from {}",
        config.businesses_path.display()
    );
    Ok(())
}

pub(crate) async fn run_sweep(pool: &PgPool) -> anyhow::Result<()> {
    let removed = replyhound_db::sweep_expired_buckets(pool, Utc::now()).await?;
    println!("removed {removed} expired rate-limit buckets");
    Ok(())
}
