//! Whole-month collection across every breakdown.

use std::future::Future;

use adlens_core::{
    normalize_account_id, CollectionSummary, DateRange, Dimension, RawCollection, RawDimensions,
};
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::client::AdsClient;
use crate::error::SourceError;

/// Anything that can return the raw records of one breakdown.
pub trait InsightsSource {
    fn fetch_dimension(
        &self,
        account_id: &str,
        range: &DateRange,
        dimension: Dimension,
    ) -> impl Future<Output = Result<Vec<Value>, SourceError>> + Send;
}

impl InsightsSource for AdsClient {
    fn fetch_dimension(
        &self,
        account_id: &str,
        range: &DateRange,
        dimension: Dimension,
    ) -> impl Future<Output = Result<Vec<Value>, SourceError>> + Send {
        AdsClient::fetch_dimension(self, account_id, range, dimension)
    }
}

/// Fetch all six breakdowns for `month_year`.
///
/// Breakdowns are fetched one after another. A failed breakdown is recorded
/// in `summary.failed_endpoints` with a matching warning and leaves its
/// array empty; the others still count.
///
/// # Errors
///
/// Returns [`SourceError::Period`] for a malformed or future month. A month
/// where every breakdown failed still yields a collection, with empty arrays
/// and one warning per failure plus a summary warning.
pub async fn collect_raw<S: InsightsSource + Sync>(
    source: &S,
    account_id: &str,
    month_year: &str,
    now: DateTime<Utc>,
) -> Result<RawCollection, SourceError> {
    let account_id = normalize_account_id(account_id);
    let date_range = DateRange::for_month(month_year, now.date_naive())?;
    let mut data = RawDimensions::default();
    let mut summary = CollectionSummary::default();

    for dimension in Dimension::ALL {
        match source
            .fetch_dimension(&account_id, &date_range, dimension)
            .await
        {
            Ok(records) => {
                tracing::info!(
                    account_id = %account_id,
                    %dimension,
                    records = records.len(),
                    "collected breakdown"
                );
                summary.successful_endpoints += 1;
                data.set(dimension, records);
            }
            Err(e) => {
                tracing::warn!(
                    account_id = %account_id,
                    %dimension,
                    error = %e,
                    "breakdown collection failed"
                );
                summary.failed_endpoints.push(dimension.as_str().to_string());
                summary.warnings.push(format!("{dimension}: {e}"));
            }
        }
    }

    if summary.successful_endpoints == 0 {
        tracing::warn!(account_id = %account_id, month_year, "no insights endpoint succeeded");
        summary
            .warnings
            .push("no insights endpoint succeeded".to_string());
    }

    summary.total_records = data.total_records();
    Ok(RawCollection {
        account_id,
        scraped_at: now,
        date_range,
        month_year: month_year.to_string(),
        data,
        summary,
    })
}
