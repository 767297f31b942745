use adlens_core::{CoreError, Dimension};
use thiserror::Error;

/// Errors returned by the ads API client.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP 429, or an API error code the platform uses for throttling.
    #[error("rate limited by ads API: {0}")]
    RateLimited(String),

    /// A 5xx response from the API.
    #[error("ads API server error (HTTP {status})")]
    Server { status: u16 },

    /// The API returned an `error` object that is not a throttle.
    #[error("ads API error (code {code:?}): {message}")]
    Api { code: Option<i64>, message: String },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{dimension} exceeded the page limit of {pages}")]
    PaginationLimit { dimension: Dimension, pages: usize },

    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error(transparent)]
    Period(#[from] CoreError),
}
