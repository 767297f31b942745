mod collect;
mod refresh;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::collect::{run_collect, run_import, CollectArgs, ImportArgs};
use crate::refresh::{run_refresh, run_refresh_all, run_show};

#[derive(Debug, Parser)]
#[command(name = "adlens-cli")]
#[command(about = "adlens command line interface")]
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
    /// Pull one month of ads data for a client and ingest it
    Collect(CollectArgs),
    /// Ingest a raw collection saved as JSON
    Import(ImportArgs),
    /// Rebuild the cached analytics document for one client
    Refresh {
        /// Client slug
        #[arg(long)]
        client: String,
    },
    /// Rebuild the cached analytics document for every client with data
    RefreshAll,
    /// Print the cached analytics document for a client
    Show {
        /// Client slug
        #[arg(long)]
        client: String,
        /// Print the full document as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
    /// Upsert clients from the roster file
    Seed,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("adlens-cli: no command given; see --help");
        return Ok(());
    };

    let config = adlens_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = adlens_db::PoolConfig::from_app_config(&config);
    let pool = adlens_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db { command } => run_db(&pool, &config, command).await?,
        Commands::Collect(args) => run_collect(&pool, &config, &args).await?,
        Commands::Import(args) => run_import(&pool, &config, &args).await?,
        Commands::Refresh { client } => run_refresh(&pool, &config, &client).await?,
        Commands::RefreshAll => run_refresh_all(&pool, &config).await?,
        Commands::Show { client, json } => run_show(&pool, &config, &client, json).await?,
    }

    Ok(())
}

async fn run_db(
    pool: &sqlx::PgPool,
    config: &adlens_core::AppConfig,
    command: DbCommands,
) -> anyhow::Result<()> {
    match command {
        DbCommands::Ping => {
            adlens_db::ping(pool).await?;
            println!("database reachable");
        }
        DbCommands::Migrate => {
            let applied = adlens_db::run_migrations(pool).await?;
            println!("applied {applied} new migrations");
        }
        DbCommands::Seed => {
            let roster = adlens_core::load_clients(&config.clients_path)?;
            let seeded = adlens_db::seed_clients(pool, &roster.clients).await?;
            println!(
                "seeded {seeded} clients from {}",
                config.clients_path.display()
            );
        }
    }
    Ok(())
}

/// Build the cache manager the CLI commands share.
pub(crate) fn cache_manager(
    pool: &sqlx::PgPool,
    config: &adlens_core::AppConfig,
) -> adlens_analytics::CacheManager<adlens_analytics::PgStore> {
    adlens_analytics::CacheManager::new(
        adlens_analytics::PgStore::new(pool.clone()),
        std::sync::Arc::new(adlens_analytics::PipelineRecorder::new(
            config.recorder_capacity,
        )),
        std::time::Duration::from_millis(config.refresh_delay_ms),
    )
}

/// Look up an active or inactive client by slug.
pub(crate) async fn load_client(
    pool: &sqlx::PgPool,
    slug: &str,
) -> anyhow::Result<adlens_db::ClientRow> {
    adlens_db::get_client_by_slug(pool, slug)
        .await?
        .ok_or_else(|| anyhow::anyhow!("client '{slug}' not found; run `adlens-cli db seed`"))
}

/// Mark a run failed, logging instead of propagating if that also fails.
pub(crate) async fn fail_run_best_effort(
    pool: &sqlx::PgPool,
    run_id: i64,
    run_type: &str,
    message: String,
) {
    if let Err(e) = adlens_db::fail_collection_run(pool, run_id, &message).await {
        tracing::error!(run_id, run_type, error = %e, "failed to mark run as failed");
    }
}
