//! Analytics derivation for adlens.
//!
//! Validates and cleans raw collections, reconciles spend, runs the per-
//! dimension aggregators and assembles the per-client analytics document.
//! The [`CacheManager`] owns writes to the cached document; everything it
//! needs from storage goes through the [`AnalyticsStore`] seam.

pub mod aggregate;
pub mod cache;
pub mod distribute;
pub mod document;
pub mod error;
pub mod ingest;
pub mod reconcile;
pub mod recorder;
pub mod store;
pub mod validate;

pub use cache::{BatchRefreshSummary, CacheManager, RefreshSummary};
pub use distribute::{distribute, DimensionRow};
pub use document::{assemble, AnalyticsDocument, DataAvailability};
pub use error::AnalyticsError;
pub use ingest::{ingest_collection, IngestOutcome};
pub use reconcile::{
    distribute_spend, reconcile, reconcile_spend, unallocated_spend, CampaignAnalysis,
    CampaignStatus, Reconciliation, SpendSource,
};
pub use recorder::{PipelineRecorder, RecorderSnapshot};
pub use store::{AnalyticsStore, PgStore, StoredCollection};
pub use validate::{clean, validate, Cleaned, FieldError, Validated, ValidationReport};
