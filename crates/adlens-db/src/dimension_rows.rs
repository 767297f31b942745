//! Flattened per-dimension rows derived from a raw snapshot.

use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{PgConnection, PgPool};

use crate::DbError;

/// One flattened record ready to be written to `dimension_rows`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDimensionRow {
    pub dimension: String,
    pub natural_key: String,
    /// Non-metric fields of the source record (names, ids, breakdown values).
    pub attributes: Value,
    pub spend: Decimal,
    pub impressions: i64,
    pub clicks: i64,
    pub reach: i64,
    pub ctr: Option<f64>,
    pub cpc: Option<f64>,
    pub cpm: Option<f64>,
    pub actions_total: f64,
}

/// Replace the rows of one client and month with `rows`.
///
/// Rows are upserted by `(client_id, month_year, dimension, natural_key)`;
/// rows for that client and month whose key is absent from `rows` are
/// deleted. Runs in a single transaction. Returns `(upserted, removed)`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails.
pub async fn replace_dimension_rows(
    pool: &PgPool,
    client_id: i64,
    month_year: &str,
    source_collection_id: i64,
    rows: &[NewDimensionRow],
) -> Result<(u64, u64), DbError> {
    let mut tx = pool.begin().await?;
    let counts =
        write_dimension_rows(&mut tx, client_id, month_year, source_collection_id, rows).await?;
    tx.commit().await?;
    Ok(counts)
}

pub(crate) async fn write_dimension_rows(
    conn: &mut PgConnection,
    client_id: i64,
    month_year: &str,
    source_collection_id: i64,
    rows: &[NewDimensionRow],
) -> Result<(u64, u64), DbError> {
    let mut upserted = 0u64;

    for row in rows {
        let result = sqlx::query(
            "INSERT INTO dimension_rows \
                 (client_id, month_year, dimension, natural_key, attributes, spend, \
                  impressions, clicks, reach, ctr, cpc, cpm, actions_total, \
                  source_collection_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             ON CONFLICT (client_id, month_year, dimension, natural_key) DO UPDATE SET \
                 attributes           = EXCLUDED.attributes, \
                 spend                = EXCLUDED.spend, \
                 impressions          = EXCLUDED.impressions, \
                 clicks               = EXCLUDED.clicks, \
                 reach                = EXCLUDED.reach, \
                 ctr                  = EXCLUDED.ctr, \
                 cpc                  = EXCLUDED.cpc, \
                 cpm                  = EXCLUDED.cpm, \
                 actions_total        = EXCLUDED.actions_total, \
                 source_collection_id = EXCLUDED.source_collection_id, \
                 updated_at           = NOW()",
        )
        .bind(client_id)
        .bind(month_year)
        .bind(&row.dimension)
        .bind(&row.natural_key)
        .bind(&row.attributes)
        .bind(row.spend)
        .bind(row.impressions)
        .bind(row.clicks)
        .bind(row.reach)
        .bind(row.ctr)
        .bind(row.cpc)
        .bind(row.cpm)
        .bind(row.actions_total)
        .bind(source_collection_id)
        .execute(&mut *conn)
        .await?;
        upserted += result.rows_affected();
    }

    let keys: Vec<String> = rows
        .iter()
        .map(|r| format!("{}\u{1f}{}", r.dimension, r.natural_key))
        .collect();
    let removed = sqlx::query(
        "DELETE FROM dimension_rows \
         WHERE client_id = $1 AND month_year = $2 \
           AND NOT (dimension || chr(31) || natural_key = ANY($3))",
    )
    .bind(client_id)
    .bind(month_year)
    .bind(&keys)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    Ok((upserted, removed))
}

/// Row counts per dimension for one client and month, ordered by dimension.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_dimension_rows(
    pool: &PgPool,
    client_id: i64,
    month_year: &str,
) -> Result<Vec<(String, i64)>, DbError> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        "SELECT dimension, COUNT(*) \
         FROM dimension_rows \
         WHERE client_id = $1 AND month_year = $2 \
         GROUP BY dimension \
         ORDER BY dimension",
    )
    .bind(client_id)
    .bind(month_year)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
