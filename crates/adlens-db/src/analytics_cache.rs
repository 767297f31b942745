//! The single-row-per-client analytics document cache.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AnalyticsCacheRow {
    pub client_id: i64,
    pub month_year: String,
    pub processed_at: DateTime<Utc>,
    pub source_data_id: i64,
    pub document: Value,
    pub updated_at: DateTime<Utc>,
}

/// Write the analytics document for a client, overwriting any previous one.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_analytics_cache(
    pool: &PgPool,
    client_id: i64,
    month_year: &str,
    processed_at: DateTime<Utc>,
    source_data_id: i64,
    document: &Value,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO analytics_cache \
             (client_id, month_year, processed_at, source_data_id, document) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (client_id) DO UPDATE SET \
             month_year     = EXCLUDED.month_year, \
             processed_at   = EXCLUDED.processed_at, \
             source_data_id = EXCLUDED.source_data_id, \
             document       = EXCLUDED.document, \
             updated_at     = NOW()",
    )
    .bind(client_id)
    .bind(month_year)
    .bind(processed_at)
    .bind(source_data_id)
    .bind(document)
    .execute(pool)
    .await?;

    Ok(())
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_analytics_cache(
    pool: &PgPool,
    client_id: i64,
) -> Result<Option<AnalyticsCacheRow>, DbError> {
    let row = sqlx::query_as::<_, AnalyticsCacheRow>(
        "SELECT client_id, month_year, processed_at, source_data_id, document, updated_at \
         FROM analytics_cache \
         WHERE client_id = $1",
    )
    .bind(client_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
