//! Raw collection snapshots, one per client and month.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlx::{PgConnection, PgPool};

use crate::dimension_rows::{write_dimension_rows, NewDimensionRow};
use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RawCollectionRow {
    pub id: i64,
    pub client_id: i64,
    pub month_year: String,
    pub account_id: String,
    pub scraped_at: DateTime<Utc>,
    pub date_since: NaiveDate,
    pub date_until: NaiveDate,
    pub total_records: i32,
    /// The cleaned collection, serialized.
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert parameters for [`upsert_raw_collection`].
#[derive(Debug, Clone, Copy)]
pub struct NewRawCollection<'a> {
    pub month_year: &'a str,
    pub account_id: &'a str,
    pub scraped_at: DateTime<Utc>,
    pub date_since: NaiveDate,
    pub date_until: NaiveDate,
    pub total_records: i32,
    pub payload: &'a Value,
}

/// Store a snapshot, replacing any earlier snapshot for the same month.
///
/// Returns the row id, which stays stable across replacements.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_raw_collection(
    pool: &PgPool,
    client_id: i64,
    raw: &NewRawCollection<'_>,
) -> Result<i64, DbError> {
    let mut conn = pool.acquire().await?;
    upsert_raw_collection_on(&mut conn, client_id, raw).await
}

/// Rows written by [`store_collection_with_rows`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredSnapshot {
    pub raw_collection_id: i64,
    pub rows_written: u64,
    pub rows_removed: u64,
}

/// Store a snapshot and replace its month's dimension rows in one
/// transaction. Either both land or neither does.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; nothing is committed.
pub async fn store_collection_with_rows(
    pool: &PgPool,
    client_id: i64,
    raw: &NewRawCollection<'_>,
    rows: &[NewDimensionRow],
) -> Result<StoredSnapshot, DbError> {
    let mut tx = pool.begin().await?;
    let raw_collection_id = upsert_raw_collection_on(&mut tx, client_id, raw).await?;
    let (rows_written, rows_removed) =
        write_dimension_rows(&mut tx, client_id, raw.month_year, raw_collection_id, rows).await?;
    tx.commit().await?;

    Ok(StoredSnapshot {
        raw_collection_id,
        rows_written,
        rows_removed,
    })
}

async fn upsert_raw_collection_on(
    conn: &mut PgConnection,
    client_id: i64,
    raw: &NewRawCollection<'_>,
) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO raw_collections \
             (client_id, month_year, account_id, scraped_at, date_since, date_until, \
              total_records, payload) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (client_id, month_year) DO UPDATE SET \
             account_id    = EXCLUDED.account_id, \
             scraped_at    = EXCLUDED.scraped_at, \
             date_since    = EXCLUDED.date_since, \
             date_until    = EXCLUDED.date_until, \
             total_records = EXCLUDED.total_records, \
             payload       = EXCLUDED.payload, \
             updated_at    = NOW() \
         RETURNING id",
    )
    .bind(client_id)
    .bind(raw.month_year)
    .bind(raw.account_id)
    .bind(raw.scraped_at)
    .bind(raw.date_since)
    .bind(raw.date_until)
    .bind(raw.total_records)
    .bind(raw.payload)
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

/// The most recently scraped snapshot for a client, across all months.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_latest_raw_collection(
    pool: &PgPool,
    client_id: i64,
) -> Result<Option<RawCollectionRow>, DbError> {
    let row = sqlx::query_as::<_, RawCollectionRow>(
        "SELECT id, client_id, month_year, account_id, scraped_at, date_since, date_until, \
                total_records, payload, created_at, updated_at \
         FROM raw_collections \
         WHERE client_id = $1 \
         ORDER BY scraped_at DESC, id DESC \
         LIMIT 1",
    )
    .bind(client_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Distinct client ids that have at least one stored snapshot, ascending.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_client_ids_with_collections(pool: &PgPool) -> Result<Vec<i64>, DbError> {
    let ids = sqlx::query_scalar::<_, i64>(
        "SELECT DISTINCT client_id FROM raw_collections ORDER BY client_id",
    )
    .fetch_all(pool)
    .await?;

    Ok(ids)
}
