//! Wire shapes of the insights API.

use serde::Deserialize;
use serde_json::Value;

/// One page of an insights response.
#[derive(Debug, Deserialize)]
pub struct InsightsPage {
    #[serde(default)]
    pub data: Vec<Value>,
    pub paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
pub struct Paging {
    /// Absolute URL of the next page; absent on the last page.
    pub next: Option<String>,
}

/// The `error` object the API returns with non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct ApiErrorEnvelope {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: String,
    pub code: Option<i64>,
}

impl ApiErrorBody {
    /// Application-level throttling codes (account, app and user limits).
    #[must_use]
    pub fn is_throttle(&self) -> bool {
        matches!(self.code, Some(4 | 17 | 32 | 613 | 80_000..=80_014))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_without_paging_is_last() {
        let page: InsightsPage = serde_json::from_str(r#"{"data":[{"a":1}]}"#).unwrap();
        assert_eq!(page.data.len(), 1);
        assert!(page.paging.is_none());
    }

    #[test]
    fn throttle_codes_are_recognised() {
        let body = |code| ApiErrorBody {
            message: String::new(),
            code: Some(code),
        };
        assert!(body(17).is_throttle());
        assert!(body(80_004).is_throttle());
        assert!(!body(100).is_throttle());
    }
}
