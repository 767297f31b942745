//! Background job scheduler.
//!
//! Registers the monthly-data collection job and the cache refresh job at
//! server startup. Cron expressions (six fields, UTC) come from
//! `ADLENS_COLLECT_CRON` and `ADLENS_REFRESH_CRON`.

use chrono::Utc;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::api::AppState;
use crate::pipeline::{self, Trigger};

const DEFAULT_COLLECT_CRON: &str = "0 0 3 * * *";
const DEFAULT_REFRESH_CRON: &str = "0 30 3 * * *";

fn cron_from_env(var: &str, default: &str) -> String {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive for
/// the lifetime of the process; dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised, a
/// cron expression is invalid, or the scheduler fails to start.
pub async fn build_scheduler(state: AppState) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    let collect_cron = cron_from_env("ADLENS_COLLECT_CRON", DEFAULT_COLLECT_CRON);
    let refresh_cron = cron_from_env("ADLENS_REFRESH_CRON", DEFAULT_REFRESH_CRON);

    if state.source.is_some() {
        register_collect_job(&scheduler, state.clone(), &collect_cron).await?;
    } else {
        tracing::warn!("scheduler: no ads access token; collection job not registered");
    }
    register_refresh_job(&scheduler, state, &refresh_cron).await?;

    scheduler.start().await?;
    tracing::info!(collect_cron, refresh_cron, "scheduler started");
    Ok(scheduler)
}

/// Collect the current month for every active client with an ad account.
/// Documents are rebuilt by the refresh job, not here.
async fn register_collect_job(
    scheduler: &JobScheduler,
    state: AppState,
    cron: &str,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let state = state.clone();
        Box::pin(async move {
            tracing::info!("scheduler: starting collection run");
            run_collect_job(&state).await;
            tracing::info!("scheduler: collection run complete");
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

async fn run_collect_job(state: &AppState) {
    let clients = match adlens_db::list_active_clients(&state.pool).await {
        Ok(clients) => clients,
        Err(e) => {
            tracing::error!(error = %e, "scheduler: failed to load active clients");
            return;
        }
    };

    let month_year = adlens_core::current_month(Utc::now());
    for client in clients.iter().filter(|c| c.ad_account_id.is_some()) {
        match pipeline::collect_client(state, client, &month_year, Trigger::Scheduler, false).await
        {
            Ok(report) => tracing::info!(
                client = %client.slug,
                month_year,
                records = report.ingest.records,
                "scheduler: client collected"
            ),
            Err(e) => tracing::error!(
                client = %client.slug,
                month_year,
                error = %e,
                "scheduler: client collection failed"
            ),
        }
    }
}

async fn register_refresh_job(
    scheduler: &JobScheduler,
    state: AppState,
    cron: &str,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let state = state.clone();
        Box::pin(async move {
            match pipeline::refresh_all(&state, Trigger::Scheduler).await {
                Ok(report) => tracing::info!(
                    total = report.summary.total,
                    succeeded = report.summary.succeeded,
                    failed = report.summary.failed,
                    "scheduler: cache refresh complete"
                ),
                Err(e) => tracing::error!(error = %e, "scheduler: cache refresh failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}
