//! HTTP client for the ads platform insights API.
//!
//! Each breakdown is fetched from `act_{account}/insights` with the level,
//! fields and breakdowns that breakdown needs. Pages are followed through
//! `paging.next` until exhausted or [`MAX_PAGES`] is reached. Every page
//! request goes through the retry policy in [`crate::retry`].

use std::time::Duration;

use adlens_core::{normalize_account_id, DateRange, Dimension};
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;

use crate::error::SourceError;
use crate::retry::retry_with_backoff;
use crate::types::{ApiErrorEnvelope, InsightsPage};

const DEFAULT_BASE_URL: &str = "https://graph.facebook.com/v19.0/";

/// Upper bound on pages followed for one breakdown.
pub const MAX_PAGES: usize = 50;

const PAGE_SIZE: &str = "500";

const METRIC_FIELDS: &str =
    "spend,impressions,clicks,reach,frequency,ctr,cpc,cpm,actions,action_values,conversions";

/// Client for the insights API.
///
/// Use [`AdsClient::new`] for production or [`AdsClient::with_base_url`] to
/// point at a mock server in tests.
pub struct AdsClient {
    client: Client,
    access_token: String,
    base_url: Url,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl AdsClient {
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        access_token: &str,
        timeout_secs: u64,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, SourceError> {
        Self::with_base_url(
            access_token,
            timeout_secs,
            max_retries,
            backoff_base_ms,
            DEFAULT_BASE_URL,
        )
    }

    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the `reqwest::Client` cannot be built,
    /// or [`SourceError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        access_token: &str,
        timeout_secs: u64,
        max_retries: u32,
        backoff_base_ms: u64,
        base_url: &str,
    ) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("adlens/0.1 (insights-collector)")
            .build()?;

        // A trailing slash keeps the version segment when joining paths.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| SourceError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            access_token: access_token.to_owned(),
            base_url,
            max_retries,
            backoff_base_ms,
        })
    }

    /// Fetch every record of one breakdown for `range`, following pagination.
    ///
    /// # Errors
    ///
    /// - [`SourceError::RateLimited`], [`SourceError::Server`] or
    ///   [`SourceError::Http`] once retries are exhausted.
    /// - [`SourceError::Api`] for non-retriable API errors.
    /// - [`SourceError::Deserialize`] if a page is not an insights page.
    /// - [`SourceError::PaginationLimit`] if more than [`MAX_PAGES`] pages
    ///   are offered.
    pub async fn fetch_dimension(
        &self,
        account_id: &str,
        range: &DateRange,
        dimension: Dimension,
    ) -> Result<Vec<Value>, SourceError> {
        let mut url = self.build_url(account_id, range, dimension)?;
        let mut records = Vec::new();

        for page_number in 1..=MAX_PAGES {
            let page = retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
                self.request_page(&url)
            })
            .await?;

            tracing::debug!(
                %dimension,
                page = page_number,
                records = page.data.len(),
                "fetched insights page"
            );
            records.extend(page.data);

            match page.paging.and_then(|p| p.next) {
                Some(next) => {
                    url = Url::parse(&next).map_err(|e| SourceError::InvalidBaseUrl {
                        url: next.clone(),
                        reason: e.to_string(),
                    })?;
                }
                None => return Ok(records),
            }
        }

        Err(SourceError::PaginationLimit {
            dimension,
            pages: MAX_PAGES,
        })
    }

    fn build_url(
        &self,
        account_id: &str,
        range: &DateRange,
        dimension: Dimension,
    ) -> Result<Url, SourceError> {
        let path = format!("act_{}/insights", normalize_account_id(account_id));
        let mut url = self
            .base_url
            .join(&path)
            .map_err(|e| SourceError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: e.to_string(),
            })?;

        let (level, extra_fields, breakdowns) = endpoint_shape(dimension);
        let fields = if extra_fields.is_empty() {
            METRIC_FIELDS.to_string()
        } else {
            format!("{extra_fields},{METRIC_FIELDS}")
        };
        let time_range = serde_json::json!({
            "since": range.since.to_string(),
            "until": range.until.to_string(),
        })
        .to_string();

        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("access_token", &self.access_token);
            pairs.append_pair("level", level);
            pairs.append_pair("fields", &fields);
            if let Some(breakdowns) = breakdowns {
                pairs.append_pair("breakdowns", breakdowns);
            }
            pairs.append_pair("time_range", &time_range);
            pairs.append_pair("limit", PAGE_SIZE);
        }
        Ok(url)
    }

    async fn request_page(&self, url: &Url) -> Result<InsightsPage, SourceError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(classify_failure(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| SourceError::Deserialize {
            context: redact_token(url),
            source: e,
        })
    }
}

/// `(level, identifying fields, breakdowns)` for each breakdown endpoint.
fn endpoint_shape(dimension: Dimension) -> (&'static str, &'static str, Option<&'static str>) {
    match dimension {
        Dimension::Campaigns => (
            "campaign",
            "campaign_id,campaign_name,objective,buying_type,optimization_goal",
            None,
        ),
        Dimension::Demographics => ("account", "", Some("age,gender")),
        Dimension::Regional => ("account", "", Some("region")),
        Dimension::Devices => ("account", "", Some("device_platform")),
        Dimension::Platforms => (
            "account",
            "",
            Some("publisher_platform,platform_position"),
        ),
        Dimension::AdLevel => ("ad", "ad_id,ad_name,campaign_id,adset_id", None),
    }
}

fn classify_failure(status: StatusCode, body: &str) -> SourceError {
    let api_error = serde_json::from_str::<ApiErrorEnvelope>(body)
        .ok()
        .map(|e| e.error);

    if status == StatusCode::TOO_MANY_REQUESTS {
        let message = api_error.map_or_else(|| "HTTP 429".to_string(), |e| e.message);
        return SourceError::RateLimited(message);
    }
    if let Some(error) = api_error {
        if error.is_throttle() {
            return SourceError::RateLimited(error.message);
        }
        if !status.is_server_error() {
            return SourceError::Api {
                code: error.code,
                message: error.message,
            };
        }
    }
    if status.is_server_error() {
        return SourceError::Server {
            status: status.as_u16(),
        };
    }
    SourceError::Api {
        code: None,
        message: format!("unexpected HTTP status {status}"),
    }
}

/// The URL with the access token removed, for error context.
fn redact_token(url: &Url) -> String {
    let mut clean = url.clone();
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "access_token")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    clean.query_pairs_mut().clear().extend_pairs(kept);
    clean.to_string()
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
