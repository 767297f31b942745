//! Collection and import command handlers.
//!
//! Both record a `collection` run with trigger `cli`, ingest the raw data
//! through the same path the server uses and then rebuild the client's
//! cached document unless `--no-refresh` was given.

use std::path::PathBuf;

use adlens_analytics::{ingest_collection, CacheManager, IngestOutcome, PgStore};
use adlens_core::{current_month, DateRange, Dimension, RawCollection};
use adlens_db::ClientRow;
use adlens_source::AdsClient;
use chrono::Utc;
use clap::Args;

use crate::{cache_manager, fail_run_best_effort, load_client};

#[derive(Debug, Args)]
pub struct CollectArgs {
    /// Client slug
    #[arg(long)]
    pub client: String,
    /// Month to collect as YYYY-MM; defaults to the current month
    #[arg(long)]
    pub month: Option<String>,
    /// Skip rebuilding the cached document after ingest
    #[arg(long)]
    pub no_refresh: bool,
    /// Print what would be fetched without calling the API or writing
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Client slug
    #[arg(long)]
    pub client: String,
    /// Path to a raw collection JSON file
    #[arg(long)]
    pub file: PathBuf,
    /// Skip rebuilding the cached document after ingest
    #[arg(long)]
    pub no_refresh: bool,
}

/// Pull one month from the ads API for `args.client`.
///
/// # Errors
///
/// Returns an error if the client is unknown or has no ad account, the month
/// is malformed, no access token is configured, or the run fails.
pub(crate) async fn run_collect(
    pool: &sqlx::PgPool,
    config: &adlens_core::AppConfig,
    args: &CollectArgs,
) -> anyhow::Result<()> {
    let client = load_client(pool, &args.client).await?;
    let Some(account_id) = client.ad_account_id.as_deref() else {
        anyhow::bail!(
            "client '{}' has no ad_account_id; update config/clients.yaml",
            client.slug
        );
    };

    let now = Utc::now();
    let month_year = args.month.clone().unwrap_or_else(|| current_month(now));
    let range = DateRange::for_month(&month_year, now.date_naive())?;

    if args.dry_run {
        let dimensions: Vec<&str> = Dimension::ALL.iter().map(|d| d.as_str()).collect();
        println!(
            "dry-run: would collect {month_year} ({} to {}) for '{}' (act_{account_id}): [{}]",
            range.since,
            range.until,
            client.slug,
            dimensions.join(", ")
        );
        return Ok(());
    }

    let Some(token) = config.ads_access_token.as_deref() else {
        anyhow::bail!("ADS_ACCESS_TOKEN is not set; cannot collect");
    };
    let source = AdsClient::with_base_url(
        token,
        config.ads_request_timeout_secs,
        config.ads_max_retries,
        config.ads_retry_backoff_base_ms,
        &config.ads_api_base_url,
    )?;

    let cache = cache_manager(pool, config);
    let run = adlens_db::create_collection_run(pool, "collection", "cli").await?;
    adlens_db::start_collection_run(pool, run.id).await?;

    let raw = match adlens_source::collect_raw(&source, account_id, &month_year, now).await {
        Ok(raw) => raw,
        Err(e) => {
            record_failure(pool, run.id, &client, format!("{e:#}")).await;
            return Err(e.into());
        }
    };

    let outcome = ingest_tracked(pool, &cache, run.id, &client, &raw).await?;
    print_outcome(&client, &outcome);

    if !args.no_refresh {
        refresh_after_ingest(&cache, &client).await;
    }
    Ok(())
}

/// Ingest a collection previously saved as JSON.
///
/// # Errors
///
/// Returns an error if the client is unknown, the file cannot be read or
/// parsed, or the ingest fails validation or storage.
pub(crate) async fn run_import(
    pool: &sqlx::PgPool,
    config: &adlens_core::AppConfig,
    args: &ImportArgs,
) -> anyhow::Result<()> {
    let client = load_client(pool, &args.client).await?;
    let raw = read_raw_collection(&args.file)?;

    let cache = cache_manager(pool, config);
    let run = adlens_db::create_collection_run(pool, "collection", "cli").await?;
    adlens_db::start_collection_run(pool, run.id).await?;

    let outcome = ingest_tracked(pool, &cache, run.id, &client, &raw).await?;
    print_outcome(&client, &outcome);

    if !args.no_refresh {
        refresh_after_ingest(&cache, &client).await;
    }
    Ok(())
}

pub(crate) fn read_raw_collection(path: &std::path::Path) -> anyhow::Result<RawCollection> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("{} is not a raw collection: {e}", path.display()))?;
    Ok(raw)
}

async fn ingest_tracked(
    pool: &sqlx::PgPool,
    cache: &CacheManager<PgStore>,
    run_id: i64,
    client: &ClientRow,
    raw: &RawCollection,
) -> anyhow::Result<IngestOutcome> {
    match ingest_collection(cache.store(), cache.recorder(), client.id, raw).await {
        Ok(outcome) => {
            let records = i32::try_from(outcome.records).unwrap_or(i32::MAX);
            adlens_db::record_collection_run_client(
                pool,
                run_id,
                client.id,
                "succeeded",
                records,
                None,
            )
            .await?;
            adlens_db::complete_collection_run(pool, run_id, records).await?;
            Ok(outcome)
        }
        Err(e) => {
            record_failure(pool, run_id, client, format!("{e:#}")).await;
            Err(e.into())
        }
    }
}

async fn record_failure(pool: &sqlx::PgPool, run_id: i64, client: &ClientRow, message: String) {
    if let Err(e) = adlens_db::record_collection_run_client(
        pool,
        run_id,
        client.id,
        "failed",
        0,
        Some(&message),
    )
    .await
    {
        tracing::error!(client = %client.slug, error = %e, "failed to record client outcome");
    }
    fail_run_best_effort(pool, run_id, "collection", message).await;
}

async fn refresh_after_ingest(cache: &CacheManager<PgStore>, client: &ClientRow) {
    let summary = cache.trigger_refresh(client.id).await;
    match summary.error {
        None => println!("refreshed analytics for '{}'", client.slug),
        Some(error) => println!("refresh failed for '{}': {error}", client.slug),
    }
}

fn print_outcome(client: &ClientRow, outcome: &IngestOutcome) {
    println!(
        "ingested {} records for '{}' ({}), {} dimension rows written, {} removed",
        outcome.records,
        client.slug,
        outcome.month_year,
        outcome.rows_written,
        outcome.rows_removed
    );
    for warning in &outcome.warnings {
        println!("  warning: {warning}");
    }
    for note in &outcome.transformations {
        println!("  cleaned: {note}");
    }
}
