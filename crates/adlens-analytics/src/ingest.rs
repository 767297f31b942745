//! Validate, clean and persist one raw collection.

use std::time::Instant;

use adlens_core::RawCollection;
use serde::Serialize;

use crate::distribute::distribute;
use crate::error::AnalyticsError;
use crate::recorder::PipelineRecorder;
use crate::store::AnalyticsStore;
use crate::validate::{clean, validate};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutcome {
    pub source_data_id: i64,
    pub month_year: String,
    pub records: usize,
    pub warnings: Vec<String>,
    pub transformations: Vec<String>,
    pub rows_written: u64,
    pub rows_removed: u64,
}

/// Store `raw` as the client's snapshot for its month and refresh the
/// flattened dimension rows. The snapshot and its rows are written together.
///
/// # Errors
///
/// Returns [`AnalyticsError::Validation`] when the collection fails schema
/// checks, [`AnalyticsError::Encode`] if a record cannot be flattened, or
/// [`AnalyticsError::Storage`] if the write fails. Nothing is stored in any
/// of these cases.
pub async fn ingest_collection<S: AnalyticsStore>(
    store: &S,
    recorder: &PipelineRecorder,
    client_id: i64,
    raw: &RawCollection,
) -> Result<IngestOutcome, AnalyticsError> {
    let started = Instant::now();
    let validated = validate(raw);
    let Some(collection) = validated.collection else {
        let errors = validated.report.errors;
        recorder.record_error(
            "validate",
            Some(client_id),
            format!("{} validation error(s)", errors.len()),
        );
        tracing::warn!(client_id, errors = errors.len(), "collection rejected");
        return Err(AnalyticsError::Validation { errors });
    };

    let cleaned = clean(collection);
    recorder.record_timing("validate", Some(client_id), started.elapsed());

    let data = cleaned.data;
    let rows = match distribute(&data) {
        Ok(rows) => rows,
        Err(e) => {
            recorder.record_error("distribute", Some(client_id), e.to_string());
            return Err(e);
        }
    };

    let started = Instant::now();
    let stored = match store.save_collection(client_id, &data, &rows).await {
        Ok(stored) => stored,
        Err(e) => {
            recorder.record_error("store", Some(client_id), e.to_string());
            return Err(e);
        }
    };
    let source_data_id = stored.raw_collection_id;
    let rows_written = stored.rows_written;
    let rows_removed = stored.rows_removed;
    recorder.record_timing("store", Some(client_id), started.elapsed());

    tracing::info!(
        client_id,
        source_data_id,
        month_year = %data.month_year,
        records = data.summary.total_records,
        rows_written,
        rows_removed,
        "collection ingested"
    );

    Ok(IngestOutcome {
        source_data_id,
        month_year: data.month_year,
        records: data.summary.total_records,
        warnings: data.summary.warnings,
        transformations: cleaned.transformations,
        rows_written,
        rows_removed,
    })
}
