//! Cache refresh and read-back commands.

use crate::{cache_manager, fail_run_best_effort, load_client};

/// Rebuild one client's document inside a `refresh` run.
///
/// # Errors
///
/// Returns an error if the client is unknown, run bookkeeping fails, or the
/// refresh itself fails.
pub(crate) async fn run_refresh(
    pool: &sqlx::PgPool,
    config: &adlens_core::AppConfig,
    slug: &str,
) -> anyhow::Result<()> {
    let client = load_client(pool, slug).await?;
    let cache = cache_manager(pool, config);

    let run = adlens_db::create_collection_run(pool, "refresh", "cli").await?;
    adlens_db::start_collection_run(pool, run.id).await?;

    match cache.refresh(client.id).await {
        Ok(document) => {
            adlens_db::record_collection_run_client(pool, run.id, client.id, "succeeded", 0, None)
                .await?;
            adlens_db::complete_collection_run(pool, run.id, 0).await?;
            println!(
                "refreshed '{}' from {} (snapshot {})",
                client.slug, document.month_year, document.source_data_id
            );
            Ok(())
        }
        Err(e) => {
            let message = e.to_string();
            adlens_db::record_collection_run_client(
                pool,
                run.id,
                client.id,
                "failed",
                0,
                Some(&message),
            )
            .await?;
            fail_run_best_effort(pool, run.id, "refresh", message).await;
            Err(e.into())
        }
    }
}

/// Rebuild every client with stored data inside a `batch_refresh` run.
///
/// # Errors
///
/// Returns an error if run bookkeeping fails or the client list cannot be
/// read. Individual client failures are reported, not returned.
pub(crate) async fn run_refresh_all(
    pool: &sqlx::PgPool,
    config: &adlens_core::AppConfig,
) -> anyhow::Result<()> {
    let cache = cache_manager(pool, config);
    let run = adlens_db::create_collection_run(pool, "batch_refresh", "cli").await?;
    adlens_db::start_collection_run(pool, run.id).await?;

    let summary = cache.trigger_batch_refresh().await;
    if let Some(error) = summary.error {
        fail_run_best_effort(pool, run.id, "batch_refresh", error.clone()).await;
        anyhow::bail!("batch refresh failed: {error}");
    }

    for result in &summary.results {
        let status = if result.success { "succeeded" } else { "failed" };
        adlens_db::record_collection_run_client(
            pool,
            run.id,
            result.client_id,
            status,
            0,
            result.error.as_deref(),
        )
        .await?;
        if let Some(error) = &result.error {
            println!("  client {}: {error}", result.client_id);
        }
    }
    let succeeded = i32::try_from(summary.succeeded).unwrap_or(i32::MAX);
    adlens_db::complete_collection_run(pool, run.id, succeeded).await?;

    println!(
        "refreshed {}/{} clients ({} failed)",
        summary.succeeded, summary.total, summary.failed
    );
    Ok(())
}

/// Print the cached document for a client. Never computes one.
///
/// # Errors
///
/// Returns an error if the client is unknown or nothing is cached yet.
pub(crate) async fn run_show(
    pool: &sqlx::PgPool,
    config: &adlens_core::AppConfig,
    slug: &str,
    json: bool,
) -> anyhow::Result<()> {
    let client = load_client(pool, slug).await?;
    let document = cache_manager(pool, config).get(client.id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&document)?);
        return Ok(());
    }

    let overview = &document.overview;
    println!("{} ({})", client.name, document.month_year);
    println!("  processed:   {}", document.processed_at.format("%Y-%m-%d %H:%M UTC"));
    println!("  total spend: {:.2}", overview.total_spend);
    println!(
        "  campaigns:   {} active / {} total",
        overview.active_campaigns, overview.total_campaigns
    );
    println!("  impressions: {:.0}", overview.total_impressions);
    println!("  clicks:      {:.0}", overview.total_clicks);
    println!("  reach:       {:.0}", overview.total_reach);
    if let Some(gender) = &document.demographics.primary_gender {
        println!("  top gender:  {gender}");
    }
    if let Some(region) = &document.regional.top_region {
        println!("  top region:  {region}");
    }
    Ok(())
}
