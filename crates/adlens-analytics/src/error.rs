use adlens_db::DbError;
use thiserror::Error;

use crate::validate::FieldError;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// The raw collection failed schema or envelope checks. Nothing was stored.
    #[error("collection failed validation with {} error(s)", .errors.len())]
    Validation { errors: Vec<FieldError> },

    /// No analytics document has been computed for this client yet.
    #[error("no analytics cached for client {client_id}")]
    CacheMiss { client_id: i64 },

    /// A refresh was requested for a client with no stored collection.
    #[error("no raw collection stored for client {client_id}")]
    NoCollection { client_id: i64 },

    /// A cleaned record could not be turned into its JSON attribute map.
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(#[from] DbError),
}
