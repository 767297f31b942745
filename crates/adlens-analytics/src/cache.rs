//! The analytics cache manager.
//!
//! Owns writes to the per-client document. A refresh reads the latest stored
//! snapshot, rebuilds the whole document and upserts it in one write; any
//! failure before the upsert leaves the previous document in place.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::document::{assemble, AnalyticsDocument};
use crate::error::AnalyticsError;
use crate::recorder::PipelineRecorder;
use crate::store::AnalyticsStore;
use crate::validate::clean;

/// Outcome of one client refresh, as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSummary {
    pub client_id: i64,
    pub success: bool,
    pub month_year: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub source_data_id: Option<i64>,
    pub error: Option<String>,
}

impl RefreshSummary {
    fn succeeded(document: &AnalyticsDocument) -> Self {
        Self {
            client_id: document.client_id,
            success: true,
            month_year: Some(document.month_year.clone()),
            processed_at: Some(document.processed_at),
            source_data_id: Some(document.source_data_id),
            error: None,
        }
    }

    fn failed(client_id: i64, error: &AnalyticsError) -> Self {
        Self {
            client_id,
            success: false,
            month_year: None,
            processed_at: None,
            source_data_id: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRefreshSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<RefreshSummary>,
    /// Set when the client list itself could not be read.
    pub error: Option<String>,
}

pub struct CacheManager<S> {
    store: S,
    recorder: Arc<PipelineRecorder>,
    refresh_delay: Duration,
}

impl<S: AnalyticsStore> CacheManager<S> {
    #[must_use]
    pub fn new(store: S, recorder: Arc<PipelineRecorder>, refresh_delay: Duration) -> Self {
        Self {
            store,
            recorder,
            refresh_delay,
        }
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn recorder(&self) -> &Arc<PipelineRecorder> {
        &self.recorder
    }

    /// Rebuild and store the document for one client.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::NoCollection`] when the client has no
    /// stored snapshot, or [`AnalyticsError::Storage`] if a read or the
    /// final upsert fails.
    pub async fn refresh(&self, client_id: i64) -> Result<AnalyticsDocument, AnalyticsError> {
        let started = Instant::now();
        let result = self.rebuild(client_id).await;
        match &result {
            Ok(document) => {
                self.recorder
                    .record_timing("refresh", Some(client_id), started.elapsed());
                tracing::info!(
                    client_id,
                    month_year = %document.month_year,
                    source_data_id = document.source_data_id,
                    "analytics refreshed"
                );
            }
            Err(e) => {
                self.recorder
                    .record_error("refresh", Some(client_id), e.to_string());
                tracing::warn!(client_id, error = %e, "analytics refresh failed");
            }
        }
        result
    }

    async fn rebuild(&self, client_id: i64) -> Result<AnalyticsDocument, AnalyticsError> {
        let stored = self
            .store
            .latest_collection(client_id)
            .await?
            .ok_or(AnalyticsError::NoCollection { client_id })?;
        let cleaned = clean(stored.collection);
        let document = assemble(&cleaned.data, client_id, stored.id, Utc::now());
        self.store.upsert_analytics(&document).await?;
        Ok(document)
    }

    /// Refresh every client with a stored snapshot, one at a time, pausing
    /// `refresh_delay` between clients. One client's failure does not stop
    /// the others.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Storage`] only if the client list cannot be
    /// read.
    pub async fn batch_refresh(&self) -> Result<BatchRefreshSummary, AnalyticsError> {
        let client_ids = self.store.clients_with_collections().await?;
        let mut summary = BatchRefreshSummary {
            total: client_ids.len(),
            ..BatchRefreshSummary::default()
        };

        for (i, client_id) in client_ids.into_iter().enumerate() {
            if i > 0 && !self.refresh_delay.is_zero() {
                tokio::time::sleep(self.refresh_delay).await;
            }
            let result = match self.refresh(client_id).await {
                Ok(document) => RefreshSummary::succeeded(&document),
                Err(e) => RefreshSummary::failed(client_id, &e),
            };
            if result.success {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
            summary.results.push(result);
        }

        tracing::info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "batch refresh finished"
        );
        Ok(summary)
    }

    /// The cached document. Never computes one.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::CacheMiss`] when nothing is cached yet.
    pub async fn get(&self, client_id: i64) -> Result<AnalyticsDocument, AnalyticsError> {
        self.store
            .get_analytics(client_id)
            .await?
            .ok_or(AnalyticsError::CacheMiss { client_id })
    }

    pub async fn trigger_refresh(&self, client_id: i64) -> RefreshSummary {
        match self.refresh(client_id).await {
            Ok(document) => RefreshSummary::succeeded(&document),
            Err(e) => RefreshSummary::failed(client_id, &e),
        }
    }

    pub async fn trigger_batch_refresh(&self) -> BatchRefreshSummary {
        match self.batch_refresh().await {
            Ok(summary) => summary,
            Err(e) => {
                self.recorder.record_error("batch_refresh", None, e.to_string());
                tracing::error!(error = %e, "batch refresh could not list clients");
                BatchRefreshSummary {
                    error: Some(e.to_string()),
                    ..BatchRefreshSummary::default()
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "cache_test.rs"]
mod tests;
