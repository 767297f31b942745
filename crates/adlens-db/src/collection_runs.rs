//! Run bookkeeping for collections and cache refreshes.
//!
//! A run moves `queued -> running -> succeeded | failed`. Each client touched
//! by a run gets one row in `collection_run_clients`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

const RUN_COLUMNS: &str = "id, public_id, run_type, trigger_source, status, started_at, \
                           completed_at, records_processed, error_message, created_at";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CollectionRunRow {
    pub id: i64,
    pub public_id: Uuid,
    /// `collection`, `refresh` or `batch_refresh`.
    pub run_type: String,
    /// `cli`, `api` or `scheduler`.
    pub trigger_source: String,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub records_processed: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CollectionRunClientRow {
    pub id: i64,
    pub collection_run_id: i64,
    pub client_id: i64,
    /// `succeeded`, `failed` or `skipped`.
    pub status: String,
    pub records_processed: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Create a run in `queued` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails, including when `run_type`
/// or `trigger_source` violate the table's check constraints.
pub async fn create_collection_run(
    pool: &PgPool,
    run_type: &str,
    trigger_source: &str,
) -> Result<CollectionRunRow, DbError> {
    let row = sqlx::query_as::<_, CollectionRunRow>(&format!(
        "INSERT INTO collection_runs (public_id, run_type, trigger_source, status) \
         VALUES ($1, $2, $3, 'queued') \
         RETURNING {RUN_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(run_type)
    .bind(trigger_source)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Move a `queued` run to `running`.
///
/// # Errors
///
/// Returns [`DbError::InvalidCollectionRunTransition`] if the run is not
/// queued, or [`DbError::Sqlx`] if the update fails.
pub async fn start_collection_run(pool: &PgPool, id: i64) -> Result<(), DbError> {
    transition(
        pool,
        id,
        "UPDATE collection_runs SET status = 'running', started_at = NOW() \
         WHERE id = $1 AND status = 'queued'",
        None,
        "queued",
    )
    .await
}

/// Move a `running` run to `succeeded`.
///
/// # Errors
///
/// Returns [`DbError::InvalidCollectionRunTransition`] if the run is not
/// running, or [`DbError::Sqlx`] if the update fails.
pub async fn complete_collection_run(
    pool: &PgPool,
    id: i64,
    records_processed: i32,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE collection_runs \
         SET status = 'succeeded', completed_at = NOW(), records_processed = $2 \
         WHERE id = $1 AND status = 'running'",
    )
    .bind(id)
    .bind(records_processed)
    .execute(pool)
    .await?;

    check_transition(result.rows_affected(), id, "running")
}

/// Move a `running` run to `failed` with an error message.
///
/// # Errors
///
/// Returns [`DbError::InvalidCollectionRunTransition`] if the run is not
/// running, or [`DbError::Sqlx`] if the update fails.
pub async fn fail_collection_run(
    pool: &PgPool,
    id: i64,
    error_message: &str,
) -> Result<(), DbError> {
    transition(
        pool,
        id,
        "UPDATE collection_runs \
         SET status = 'failed', completed_at = NOW(), error_message = $2 \
         WHERE id = $1 AND status = 'running'",
        Some(error_message),
        "running",
    )
    .await
}

async fn transition(
    pool: &PgPool,
    id: i64,
    sql: &str,
    message: Option<&str>,
    expected_status: &'static str,
) -> Result<(), DbError> {
    let mut query = sqlx::query(sql).bind(id);
    if let Some(message) = message {
        query = query.bind(message);
    }
    let result = query.execute(pool).await?;
    check_transition(result.rows_affected(), id, expected_status)
}

fn check_transition(rows: u64, id: i64, expected_status: &'static str) -> Result<(), DbError> {
    if rows == 0 {
        return Err(DbError::InvalidCollectionRunTransition {
            id,
            expected_status,
        });
    }
    Ok(())
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no run has this id, or [`DbError::Sqlx`]
/// if the query fails.
pub async fn get_collection_run(pool: &PgPool, id: i64) -> Result<CollectionRunRow, DbError> {
    sqlx::query_as::<_, CollectionRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM collection_runs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// The newest `limit` runs.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_collection_runs(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<CollectionRunRow>, DbError> {
    let rows = sqlx::query_as::<_, CollectionRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM collection_runs ORDER BY created_at DESC, id DESC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Record the outcome for one client within a run. A second call for the
/// same client overwrites the first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn record_collection_run_client(
    pool: &PgPool,
    run_id: i64,
    client_id: i64,
    status: &str,
    records_processed: i32,
    error_message: Option<&str>,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO collection_run_clients \
             (collection_run_id, client_id, status, records_processed, error_message) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (collection_run_id, client_id) DO UPDATE SET \
             status            = EXCLUDED.status, \
             records_processed = EXCLUDED.records_processed, \
             error_message     = EXCLUDED.error_message",
    )
    .bind(run_id)
    .bind(client_id)
    .bind(status)
    .bind(records_processed)
    .bind(error_message)
    .execute(pool)
    .await?;

    Ok(())
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_collection_run_clients(
    pool: &PgPool,
    run_id: i64,
) -> Result<Vec<CollectionRunClientRow>, DbError> {
    let rows = sqlx::query_as::<_, CollectionRunClientRow>(
        "SELECT id, collection_run_id, client_id, status, records_processed, \
                error_message, created_at \
         FROM collection_run_clients \
         WHERE collection_run_id = $1 \
         ORDER BY client_id",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
