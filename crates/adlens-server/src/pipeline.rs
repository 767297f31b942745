//! Collection and refresh runs shared by the API handlers and the scheduler.
//!
//! Every run is tracked in `collection_runs`. Once a run has been created, any
//! error on the way out, bookkeeping included, marks it `failed` before the
//! error is returned, so no run is left `running`.

use adlens_analytics::{
    ingest_collection, AnalyticsError, BatchRefreshSummary, IngestOutcome, RefreshSummary,
};
use adlens_db::{ClientRow, DbError};
use adlens_source::{collect_raw, AdsClient, SourceError};
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::api::AppState;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("ads API access token is not configured")]
    SourceNotConfigured,
    #[error("client {client_id} not found")]
    ClientNotFound { client_id: i64 },
    #[error("client '{slug}' has no ad account id")]
    NoAdAccount { slug: String },
    #[error("collection failed: {0}")]
    Source(#[from] SourceError),
    #[error(transparent)]
    Analytics(#[from] AnalyticsError),
    #[error(transparent)]
    Db(#[from] DbError),
}

#[derive(Debug, Clone, Copy)]
pub enum Trigger {
    Api,
    Scheduler,
}

impl Trigger {
    fn as_str(self) -> &'static str {
        match self {
            Trigger::Api => "api",
            Trigger::Scheduler => "scheduler",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CollectionReport {
    pub collection_run_id: Uuid,
    pub client_id: i64,
    pub ingest: IngestOutcome,
    pub refresh: Option<RefreshSummary>,
}

#[derive(Debug, Serialize)]
pub struct RefreshReport {
    pub collection_run_id: Uuid,
    pub summary: RefreshSummary,
}

#[derive(Debug, Serialize)]
pub struct BatchRefreshReport {
    pub collection_run_id: Uuid,
    pub summary: BatchRefreshSummary,
}

fn clamp_records(records: usize) -> i32 {
    i32::try_from(records).unwrap_or(i32::MAX)
}

async fn fail_run_best_effort(pool: &sqlx::PgPool, run_id: i64, run_type: &str, message: &str) {
    if let Err(e) = adlens_db::fail_collection_run(pool, run_id, message).await {
        tracing::error!(run_id, run_type, error = %e, "failed to mark run as failed");
    }
}

/// Create and start a run, then drive `body` to completion. Any error from
/// starting the run or from `body` marks the run failed.
async fn tracked<T, F, Fut>(
    state: &AppState,
    run_type: &str,
    trigger: Trigger,
    body: F,
) -> Result<(Uuid, T), PipelineError>
where
    F: FnOnce(i64) -> Fut,
    Fut: std::future::Future<Output = Result<T, PipelineError>>,
{
    let pool = &state.pool;
    let run = adlens_db::create_collection_run(pool, run_type, trigger.as_str()).await?;
    let result = match adlens_db::start_collection_run(pool, run.id).await {
        Ok(_) => body(run.id).await,
        Err(e) => Err(e.into()),
    };
    match result {
        Ok(value) => Ok((run.public_id, value)),
        Err(e) => {
            fail_run_best_effort(pool, run.id, run_type, &e.to_string()).await;
            Err(e)
        }
    }
}

/// Pull one month for a client, ingest it and optionally rebuild its cache.
pub async fn collect_client(
    state: &AppState,
    client: &ClientRow,
    month_year: &str,
    trigger: Trigger,
    refresh: bool,
) -> Result<CollectionReport, PipelineError> {
    let source = state
        .source
        .as_deref()
        .ok_or(PipelineError::SourceNotConfigured)?;
    let account_id = client
        .ad_account_id
        .as_deref()
        .ok_or_else(|| PipelineError::NoAdAccount {
            slug: client.slug.clone(),
        })?;

    let (collection_run_id, (ingest, refresh)) =
        tracked(state, "collection", trigger, |run_id| async move {
            let ingest =
                match collect_and_ingest(state, source, client.id, account_id, month_year).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        let message = e.to_string();
                        tracing::error!(
                            client = %client.slug,
                            month_year,
                            error = %message,
                            "collection failed"
                        );
                        if let Err(db) = adlens_db::record_collection_run_client(
                            &state.pool,
                            run_id,
                            client.id,
                            "failed",
                            0,
                            Some(&message),
                        )
                        .await
                        {
                            tracing::error!(run_id, error = %db, "failed to record client outcome");
                        }
                        return Err(e);
                    }
                };

            let records = clamp_records(ingest.records);
            adlens_db::record_collection_run_client(
                &state.pool,
                run_id,
                client.id,
                "succeeded",
                records,
                None,
            )
            .await?;
            adlens_db::complete_collection_run(&state.pool, run_id, records).await?;

            let refresh = if refresh {
                Some(state.cache.trigger_refresh(client.id).await)
            } else {
                None
            };
            Ok((ingest, refresh))
        })
        .await?;

    Ok(CollectionReport {
        collection_run_id,
        client_id: client.id,
        ingest,
        refresh,
    })
}

async fn collect_and_ingest(
    state: &AppState,
    source: &AdsClient,
    client_id: i64,
    account_id: &str,
    month_year: &str,
) -> Result<IngestOutcome, PipelineError> {
    let raw = collect_raw(source, account_id, month_year, Utc::now()).await?;
    let outcome =
        ingest_collection(state.cache.store(), state.cache.recorder(), client_id, &raw).await?;
    Ok(outcome)
}

/// Rebuild one client's document inside a tracked `refresh` run.
///
/// An unknown client is rejected before any run is created.
pub async fn refresh_client(
    state: &AppState,
    client_id: i64,
    trigger: Trigger,
) -> Result<RefreshReport, PipelineError> {
    let pool = &state.pool;
    if adlens_db::get_client_by_id(pool, client_id).await?.is_none() {
        return Err(PipelineError::ClientNotFound { client_id });
    }

    let (collection_run_id, summary) = tracked(state, "refresh", trigger, |run_id| async move {
        let summary = state.cache.trigger_refresh(client_id).await;
        let status = if summary.success { "succeeded" } else { "failed" };
        adlens_db::record_collection_run_client(
            pool,
            run_id,
            client_id,
            status,
            0,
            summary.error.as_deref(),
        )
        .await?;
        match &summary.error {
            None => adlens_db::complete_collection_run(pool, run_id, 0).await?,
            Some(message) => adlens_db::fail_collection_run(pool, run_id, message).await?,
        }
        Ok(summary)
    })
    .await?;

    Ok(RefreshReport {
        collection_run_id,
        summary,
    })
}

/// Rebuild every client's document inside a tracked `batch_refresh` run.
///
/// The run succeeds when the client list could be read, even if some
/// clients failed; those are recorded per client.
pub async fn refresh_all(
    state: &AppState,
    trigger: Trigger,
) -> Result<BatchRefreshReport, PipelineError> {
    let pool = &state.pool;
    let (collection_run_id, summary) =
        tracked(state, "batch_refresh", trigger, |run_id| async move {
            let summary = state.cache.trigger_batch_refresh().await;
            for result in &summary.results {
                let status = if result.success { "succeeded" } else { "failed" };
                adlens_db::record_collection_run_client(
                    pool,
                    run_id,
                    result.client_id,
                    status,
                    0,
                    result.error.as_deref(),
                )
                .await?;
            }
            match &summary.error {
                None => {
                    adlens_db::complete_collection_run(
                        pool,
                        run_id,
                        clamp_records(summary.succeeded),
                    )
                    .await?;
                }
                Some(message) => adlens_db::fail_collection_run(pool, run_id, message).await?,
            }
            Ok(summary)
        })
        .await?;

    Ok(BatchRefreshReport {
        collection_run_id,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use adlens_analytics::PipelineRecorder;
    use sqlx::PgPool;

    use super::*;

    fn state(pool: PgPool) -> AppState {
        AppState::new(pool, None, Arc::new(PipelineRecorder::new(8)), Duration::ZERO)
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn bookkeeping_error_marks_the_run_failed(pool: PgPool) {
        let state = state(pool.clone());
        let result: Result<(Uuid, ()), PipelineError> =
            tracked(&state, "batch_refresh", Trigger::Api, |run_id| {
                let pool = pool.clone();
                async move {
                    // No client 424242 exists, so the foreign key rejects this row.
                    adlens_db::record_collection_run_client(
                        &pool, run_id, 424_242, "succeeded", 0, None,
                    )
                    .await?;
                    Ok(())
                }
            })
            .await;
        assert!(matches!(result, Err(PipelineError::Db(_))));

        let runs = adlens_db::list_collection_runs(&pool, 10).await.expect("runs");
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].run_type, "batch_refresh");
        assert_eq!(runs[0].status, "failed");
        assert!(runs[0].error_message.is_some());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn successful_body_leaves_run_to_the_caller(pool: PgPool) {
        let state = state(pool.clone());
        let (public_id, value) = tracked(&state, "refresh", Trigger::Scheduler, |_| async {
            Ok::<_, PipelineError>(7)
        })
        .await
        .expect("tracked");
        assert_eq!(value, 7);

        let runs = adlens_db::list_collection_runs(&pool, 10).await.expect("runs");
        assert_eq!(runs[0].public_id, public_id);
        assert_eq!(runs[0].status, "running");
        assert_eq!(runs[0].trigger_source, "scheduler");
    }
}
