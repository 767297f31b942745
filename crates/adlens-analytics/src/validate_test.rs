use adlens_core::{CollectionSummary, RawDimensions};
use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::json;

use super::*;

fn raw_with(data: RawDimensions) -> RawCollection {
    RawCollection {
        account_id: "123".to_string(),
        scraped_at: Utc.with_ymd_and_hms(2025, 3, 31, 6, 0, 0).unwrap(),
        date_range: DateRange {
            since: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            until: NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
        },
        month_year: "2025-03".to_string(),
        data,
        summary: CollectionSummary {
            total_records: 0,
            successful_endpoints: 6,
            failed_endpoints: vec![],
            warnings: vec![],
        },
    }
}

fn demographics(records: Vec<Value>) -> RawCollection {
    raw_with(RawDimensions {
        demographics: records,
        ..RawDimensions::default()
    })
}

fn valid(raw: &RawCollection) -> CollectionResult {
    let validated = validate(raw);
    assert!(
        validated.report.is_valid,
        "unexpected errors: {:?}",
        validated.report.errors
    );
    validated.collection.expect("valid report carries a collection")
}

#[test]
fn accepts_string_and_numeric_metrics() {
    let raw = demographics(vec![
        json!({"age": "25-34", "gender": "female", "spend": "100", "reach": 1000}),
        json!({"age": "35-44", "gender": "male", "spend": 50, "reach": "500", "clicks": null}),
    ]);
    let collection = valid(&raw);
    assert_eq!(collection.demographics.len(), 2);
    assert_eq!(collection.demographics[0].metrics.spend, Some(100.0));
    assert_eq!(collection.demographics[1].metrics.reach, Some(500.0));
    assert_eq!(collection.summary.total_records, 2);
}

#[test]
fn missing_natural_key_is_a_field_error() {
    let raw = demographics(vec![
        json!({"age": "25-34", "gender": "female"}),
        json!({"age": "25-34", "gender": "male"}),
        json!({"age": "35-44", "gender": "male"}),
        json!({"gender": "female", "spend": "5"}),
    ]);
    let validated = validate(&raw);
    assert!(!validated.report.is_valid);
    assert!(validated.collection.is_none());
    assert_eq!(
        validated.report.errors,
        vec![FieldError {
            path: "demographics[3].age".to_string(),
            message: "is required".to_string(),
        }]
    );
}

#[test]
fn non_object_record_is_rejected() {
    let raw = raw_with(RawDimensions {
        regional: vec![json!("Texas")],
        ..RawDimensions::default()
    });
    let report = validate(&raw).report;
    assert_eq!(report.errors[0].path, "regional[0]");
}

#[test]
fn object_in_metric_slot_is_rejected() {
    let raw = raw_with(RawDimensions {
        devices: vec![json!({"device_platform": "desktop", "spend": {"amount": 3}})],
        ..RawDimensions::default()
    });
    let report = validate(&raw).report;
    assert_eq!(report.errors[0].path, "devices[0].spend");
}

#[test]
fn malformed_action_list_is_rejected() {
    let raw = raw_with(RawDimensions {
        ad_level: vec![json!({"ad_id": "1", "actions": [{"value": "3"}]})],
        ..RawDimensions::default()
    });
    let report = validate(&raw).report;
    assert_eq!(report.errors[0].path, "ad_level[0].actions[0]");
}

#[test]
fn envelope_errors_are_reported_together() {
    let mut raw = demographics(vec![]);
    raw.month_year = "March".to_string();
    raw.date_range.since = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
    let report = validate(&raw).report;
    let paths: Vec<&str> = report.errors.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, vec!["month_year", "date_range"]);
}

#[test]
fn business_rules_only_warn() {
    let mut raw = raw_with(RawDimensions::default());
    raw.date_range.since = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    raw.summary.failed_endpoints = vec!["regional".to_string()];

    let validated = validate(&raw);
    assert!(validated.report.is_valid);
    assert_eq!(validated.report.warnings.len(), 3);
    assert!(validated.report.warnings[0].contains("no records"));
    assert!(validated.report.warnings[1].contains("90 days"));
    assert!(validated.report.warnings[2].contains("regional"));
    let collection = validated.collection.unwrap();
    assert_eq!(collection.summary.warnings, validated.report.warnings);
}

#[test]
fn nan_spend_is_zeroed_and_noted() {
    let raw = demographics(vec![
        json!({"age": "25-34", "gender": "female", "spend": "NaN", "reach": 10}),
    ]);
    let cleaned = clean(valid(&raw));
    assert_eq!(cleaned.data.demographics[0].metrics.spend, Some(0.0));
    assert_eq!(
        cleaned.transformations,
        vec!["demographics[0].spend: replaced NaN with 0".to_string()]
    );
}

#[test]
fn non_numeric_text_is_zeroed() {
    let raw = raw_with(RawDimensions {
        regional: vec![json!({"region": "Ohio", "cpc": "n/a", "spend": "inf"})],
        ..RawDimensions::default()
    });
    let cleaned = clean(valid(&raw));
    let metrics = &cleaned.data.regional[0].metrics;
    assert_eq!(metrics.cpc, Some(0.0));
    assert_eq!(metrics.spend, Some(0.0));
    assert_eq!(cleaned.transformations.len(), 2);
}

#[test]
fn duplicates_are_dropped_first_wins() {
    let raw = raw_with(RawDimensions {
        campaigns: vec![
            json!({"campaign_id": "c1", "campaign_name": "First"}),
            json!({"campaign_id": "c2", "campaign_name": "Other"}),
            json!({"campaign_id": "c1", "campaign_name": "Second"}),
        ],
        ..RawDimensions::default()
    });
    let cleaned = clean(valid(&raw));
    assert_eq!(cleaned.data.campaigns.len(), 2);
    assert_eq!(
        cleaned.data.campaigns[0].campaign_name.as_deref(),
        Some("First")
    );
    assert_eq!(cleaned.data.summary.total_records, 2);
    assert_eq!(
        cleaned.transformations,
        vec!["campaigns[2]: removed duplicate of key 'c1'".to_string()]
    );
}

#[test]
fn demographic_duplicates_use_age_and_gender() {
    let raw = demographics(vec![
        json!({"age": "25-34", "gender": "female", "spend": 1}),
        json!({"age": "25-34", "gender": "male", "spend": 2}),
        json!({"age": "25-34", "gender": "female", "spend": 3}),
    ]);
    let cleaned = clean(valid(&raw));
    assert_eq!(cleaned.data.demographics.len(), 2);
    assert_eq!(cleaned.data.demographics[0].metrics.spend, Some(1.0));
}

#[test]
fn cleaning_is_idempotent() {
    let raw = raw_with(RawDimensions {
        demographics: vec![
            json!({"age": "25-34", "gender": "female", "spend": "NaN"}),
            json!({"age": "25-34", "gender": "female", "spend": "4"}),
        ],
        platforms: vec![
            json!({"publisher_platform": "facebook", "platform_position": "feed", "ctr": "x"}),
        ],
        ad_level: vec![json!({
            "ad_id": 7,
            "actions": [{"action_type": "link_click", "value": "NaN"}]
        })],
        ..RawDimensions::default()
    });
    let once = clean(valid(&raw));
    assert!(!once.transformations.is_empty());

    let twice = clean(once.data.clone());
    assert_eq!(twice.data, once.data);
    assert!(twice.transformations.is_empty());
}

#[test]
fn metrics_beyond_the_storable_range_are_rejected() {
    let raw = demographics(vec![
        json!({"age": "25-34", "gender": "female", "spend": "1e308"}),
        json!({"age": "35-44", "gender": "female", "spend": 1e308,
               "actions": [{"action_type": "purchase", "value": "2e12"}]}),
    ]);

    let report = validate(&raw).report;
    assert!(!report.is_valid);
    let paths: Vec<&str> = report.errors.iter().map(|e| e.path.as_str()).collect();
    assert!(paths.contains(&"demographics[0].spend"), "{paths:?}");
    assert!(paths.contains(&"demographics[1].spend"), "{paths:?}");
    assert!(paths.contains(&"demographics[1].actions[0].value"), "{paths:?}");
}

#[test]
fn largest_storable_metric_is_accepted() {
    let raw = demographics(vec![json!({
        "age": "25-34", "gender": "female", "spend": MAX_METRIC_MAGNITUDE, "impressions": "inf"
    })]);
    let validated = validate(&raw);
    assert!(validated.report.is_valid, "{:?}", validated.report.errors);
}
