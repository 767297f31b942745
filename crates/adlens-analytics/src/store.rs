//! Storage seam for the analytics pipeline.
//!
//! [`PgStore`] maps the pipeline onto the `adlens-db` query functions. Raw
//! snapshots are stored as the cleaned [`CollectionResult`] JSON so a
//! refresh can rebuild the document without revalidating.

use std::future::Future;

use adlens_core::CollectionResult;
use adlens_db::{DbError, NewDimensionRow, NewRawCollection, StoredSnapshot};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::distribute::DimensionRow;
use crate::document::AnalyticsDocument;
use crate::error::AnalyticsError;

/// A stored snapshot with its row id.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredCollection {
    pub id: i64,
    pub client_id: i64,
    pub scraped_at: DateTime<Utc>,
    pub collection: CollectionResult,
}

pub trait AnalyticsStore: Send + Sync {
    /// Most recently scraped snapshot for a client.
    fn latest_collection(
        &self,
        client_id: i64,
    ) -> impl Future<Output = Result<Option<StoredCollection>, AnalyticsError>> + Send;

    /// Clients with at least one snapshot, ascending.
    fn clients_with_collections(
        &self,
    ) -> impl Future<Output = Result<Vec<i64>, AnalyticsError>> + Send;

    /// Store a cleaned collection and replace its month's flattened rows as
    /// one unit. On error neither the snapshot nor the rows change.
    fn save_collection(
        &self,
        client_id: i64,
        collection: &CollectionResult,
        rows: &[DimensionRow],
    ) -> impl Future<Output = Result<StoredSnapshot, AnalyticsError>> + Send;

    fn upsert_analytics(
        &self,
        document: &AnalyticsDocument,
    ) -> impl Future<Output = Result<(), AnalyticsError>> + Send;

    fn get_analytics(
        &self,
        client_id: i64,
    ) -> impl Future<Output = Result<Option<AnalyticsDocument>, AnalyticsError>> + Send;
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64_retain(value)
        .unwrap_or_default()
        .round_dp(2)
}

#[allow(clippy::cast_possible_truncation)]
fn to_count(value: f64) -> i64 {
    if value.is_finite() {
        value.round() as i64
    } else {
        0
    }
}

fn to_new_row(row: &DimensionRow) -> NewDimensionRow {
    NewDimensionRow {
        dimension: row.dimension.as_str().to_string(),
        natural_key: row.natural_key.clone(),
        attributes: row.attributes.clone(),
        spend: to_decimal(row.spend),
        impressions: to_count(row.impressions),
        clicks: to_count(row.clicks),
        reach: to_count(row.reach),
        ctr: row.ctr,
        cpc: row.cpc,
        cpm: row.cpm,
        actions_total: row.actions_total,
    }
}

impl AnalyticsStore for PgStore {
    async fn latest_collection(
        &self,
        client_id: i64,
    ) -> Result<Option<StoredCollection>, AnalyticsError> {
        let Some(row) = adlens_db::get_latest_raw_collection(&self.pool, client_id).await? else {
            return Ok(None);
        };
        let collection: CollectionResult =
            serde_json::from_value(row.payload).map_err(DbError::from)?;
        Ok(Some(StoredCollection {
            id: row.id,
            client_id: row.client_id,
            scraped_at: row.scraped_at,
            collection,
        }))
    }

    async fn clients_with_collections(&self) -> Result<Vec<i64>, AnalyticsError> {
        Ok(adlens_db::list_client_ids_with_collections(&self.pool).await?)
    }

    async fn save_collection(
        &self,
        client_id: i64,
        collection: &CollectionResult,
        rows: &[DimensionRow],
    ) -> Result<StoredSnapshot, AnalyticsError> {
        let payload = serde_json::to_value(collection).map_err(DbError::from)?;
        let total_records = i32::try_from(collection.total_records()).unwrap_or(i32::MAX);
        let new = NewRawCollection {
            month_year: &collection.month_year,
            account_id: &collection.account_id,
            scraped_at: collection.scraped_at,
            date_since: collection.date_range.since,
            date_until: collection.date_range.until,
            total_records,
            payload: &payload,
        };
        let rows: Vec<NewDimensionRow> = rows.iter().map(to_new_row).collect();
        Ok(adlens_db::store_collection_with_rows(&self.pool, client_id, &new, &rows).await?)
    }

    async fn upsert_analytics(&self, document: &AnalyticsDocument) -> Result<(), AnalyticsError> {
        let value = serde_json::to_value(document).map_err(DbError::from)?;
        adlens_db::upsert_analytics_cache(
            &self.pool,
            document.client_id,
            &document.month_year,
            document.processed_at,
            document.source_data_id,
            &value,
        )
        .await?;
        Ok(())
    }

    async fn get_analytics(
        &self,
        client_id: i64,
    ) -> Result<Option<AnalyticsDocument>, AnalyticsError> {
        let Some(row) = adlens_db::get_analytics_cache(&self.pool, client_id).await? else {
            return Ok(None);
        };
        let document = serde_json::from_value(row.document).map_err(DbError::from)?;
        Ok(Some(document))
    }
}
