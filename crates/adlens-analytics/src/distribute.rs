//! Flattening a cleaned collection into per-dimension rows.

use adlens_core::{CollectionResult, Dimension, DimensionRecord};
use serde::Serialize;
use serde_json::Value;

use crate::error::AnalyticsError;

/// Keys moved out of `attributes` into typed columns or dropped as nested lists.
const METRIC_KEYS: [&str; 11] = [
    "spend",
    "impressions",
    "clicks",
    "reach",
    "frequency",
    "ctr",
    "cpc",
    "cpm",
    "actions",
    "action_values",
    "conversions",
];

/// One queryable row per record, keyed by `(dimension, natural_key)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionRow {
    pub dimension: Dimension,
    pub natural_key: String,
    /// Non-metric fields of the record (ids, names, breakdown values).
    pub attributes: Value,
    pub spend: f64,
    pub impressions: f64,
    pub clicks: f64,
    pub reach: f64,
    pub ctr: Option<f64>,
    pub cpc: Option<f64>,
    pub cpm: Option<f64>,
    pub actions_total: f64,
}

fn rows<R: DimensionRecord + Serialize>(
    records: &[R],
    out: &mut Vec<DimensionRow>,
) -> Result<(), AnalyticsError> {
    for record in records {
        let m = record.metrics();
        let mut attributes = serde_json::to_value(record)?;
        if let Value::Object(map) = &mut attributes {
            for key in METRIC_KEYS {
                map.remove(key);
            }
            map.retain(|_, v| !v.is_null());
        }
        out.push(DimensionRow {
            dimension: R::DIMENSION,
            natural_key: record.natural_key(),
            attributes,
            spend: m.spend(),
            impressions: m.impressions(),
            clicks: m.clicks(),
            reach: m.reach(),
            ctr: m.ctr,
            cpc: m.cpc,
            cpm: m.cpm,
            actions_total: m.actions_total(),
        });
    }
    Ok(())
}

/// Flatten every breakdown of `collection` into rows, campaigns first.
///
/// # Errors
///
/// Returns [`AnalyticsError::Encode`] if a record cannot be encoded as JSON.
pub fn distribute(collection: &CollectionResult) -> Result<Vec<DimensionRow>, AnalyticsError> {
    let mut out = Vec::with_capacity(collection.total_records());
    rows(&collection.campaigns, &mut out)?;
    rows(&collection.demographics, &mut out)?;
    rows(&collection.regional, &mut out)?;
    rows(&collection.devices, &mut out)?;
    rows(&collection.platforms, &mut out)?;
    rows(&collection.ad_level, &mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use adlens_core::{CollectionSummary, DateRange};
    use chrono::{NaiveDate, TimeZone, Utc};
    use serde_json::json;

    use super::*;

    #[test]
    fn rows_split_attributes_from_metrics() {
        let collection = CollectionResult {
            account_id: "1".to_string(),
            scraped_at: Utc.with_ymd_and_hms(2025, 3, 31, 0, 0, 0).unwrap(),
            date_range: DateRange {
                since: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
                until: NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
            },
            month_year: "2025-03".to_string(),
            campaigns: vec![],
            demographics: vec![],
            regional: vec![],
            devices: vec![],
            platforms: serde_json::from_value(json!([{
                "publisher_platform": "instagram",
                "platform_position": "stream",
                "spend": "12.5",
                "ctr": "1.2"
            }]))
            .unwrap(),
            ad_level: serde_json::from_value(json!([{
                "ad_id": 9,
                "ad_name": "Hero",
                "actions": [{"action_type": "link_click", "value": "6"}]
            }]))
            .unwrap(),
            summary: CollectionSummary::default(),
        };

        let rows = distribute(&collection).unwrap();
        assert_eq!(rows.len(), 2);

        let platform = &rows[0];
        assert_eq!(platform.dimension, Dimension::Platforms);
        assert_eq!(platform.natural_key, "instagram|stream");
        assert_eq!(
            platform.attributes,
            json!({"publisher_platform": "instagram", "platform_position": "stream"})
        );
        assert!((platform.spend - 12.5).abs() < 1e-9);
        assert_eq!(platform.ctr, Some(1.2));
        assert_eq!(platform.cpc, None);

        let ad = &rows[1];
        assert_eq!(ad.natural_key, "9");
        assert_eq!(ad.attributes, json!({"ad_id": "9", "ad_name": "Hero"}));
        assert!((ad.actions_total - 6.0).abs() < 1e-9);
    }

    struct Unencodable(adlens_core::Metrics);

    impl Serialize for Unencodable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("attribute map is not encodable"))
        }
    }

    impl DimensionRecord for Unencodable {
        const DIMENSION: Dimension = Dimension::Campaigns;

        fn natural_key(&self) -> String {
            "x".to_string()
        }

        fn metrics(&self) -> &adlens_core::Metrics {
            &self.0
        }

        fn metrics_mut(&mut self) -> &mut adlens_core::Metrics {
            &mut self.0
        }
    }

    #[test]
    fn encoding_failure_is_returned_not_nulled() {
        let mut out = Vec::new();
        let err = rows(&[Unencodable(adlens_core::Metrics::default())], &mut out).unwrap_err();
        assert!(matches!(err, AnalyticsError::Encode(_)));
        assert!(err.to_string().contains("attribute map is not encodable"));
        assert!(out.is_empty());
    }
}
