//! Shared domain types and configuration for adlens.
//!
//! Holds the typed raw breakdown records returned by the ads platform, the
//! collection envelope that wraps one data pull, and the environment-driven
//! application config used by both binaries.

pub mod app_config;
pub mod clients;
pub mod collection;
pub mod config;
pub mod records;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use clients::{load_clients, normalize_account_id, ClientConfig, ClientsFile};
pub use collection::{
    current_month, parse_month, CollectionResult, CollectionSummary, DateRange, Dimension,
    RawCollection, RawDimensions,
};
pub use config::{load_app_config, load_app_config_from_env};
pub use records::{
    ActionValue, AdRecord, CampaignRecord, DemographicRecord, DeviceRecord, DimensionRecord,
    Metrics, PlatformRecord, RegionalRecord,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read clients file {path}: {source}")]
    ClientsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse clients file: {0}")]
    ClientsFileParse(#[source] serde_yaml::Error),

    #[error("invalid clients config: {0}")]
    Validation(String),
}

/// Errors raised while interpreting collection metadata.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid month identifier '{0}': expected YYYY-MM")]
    InvalidMonth(String),

    #[error("invalid date range: since {since} is after until {until}")]
    InvertedDateRange { since: String, until: String },
}
