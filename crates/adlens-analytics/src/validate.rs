//! Schema validation and cleaning of raw collections.
//!
//! [`validate`] checks the envelope and every record against its breakdown's
//! shape and, when nothing fatal was found, yields a typed
//! [`CollectionResult`]. [`clean`] then zeroes non-finite numerics and drops
//! duplicate natural keys (first occurrence wins). Both steps are pure.

use std::collections::HashSet;

use adlens_core::{
    parse_month, CollectionResult, CollectionSummary, DateRange, Dimension, DimensionRecord,
    RawCollection,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Longest date range accepted without a warning.
const MAX_EXPECTED_RANGE_DAYS: i64 = 35;

const SCALAR_FIELDS: [&str; 8] = [
    "spend",
    "impressions",
    "clicks",
    "reach",
    "frequency",
    "ctr",
    "cpc",
    "cpm",
];

const ACTION_FIELDS: [&str; 3] = ["actions", "action_values", "conversions"];

/// Largest magnitude a metric may carry: the `NUMERIC(14, 2)` money limit.
/// Anything above it cannot be stored and risks overflowing totals.
pub const MAX_METRIC_MAGNITUDE: f64 = 999_999_999_999.99;

/// One validation failure, addressed by a path such as `demographics[3].age`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub path: String,
    pub message: String,
}

impl FieldError {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<FieldError>,
    pub warnings: Vec<String>,
}

/// Outcome of [`validate`]. `collection` is present only when the report is valid.
#[derive(Debug, Clone)]
pub struct Validated {
    pub report: ValidationReport,
    pub collection: Option<CollectionResult>,
}

/// Outcome of [`clean`]: the cleaned collection and one note per change.
#[derive(Debug, Clone)]
pub struct Cleaned {
    pub data: CollectionResult,
    pub transformations: Vec<String>,
}

/// Natural-key fields each breakdown record must carry.
#[must_use]
pub fn key_fields(dimension: Dimension) -> &'static [&'static str] {
    match dimension {
        Dimension::Campaigns => &["campaign_id"],
        Dimension::Demographics => &["age", "gender"],
        Dimension::Regional => &["region"],
        Dimension::Devices => &["device_platform"],
        Dimension::Platforms => &["publisher_platform", "platform_position"],
        Dimension::AdLevel => &["ad_id"],
    }
}

/// Validate a raw collection.
///
/// Envelope errors (`month_year`, `date_range`) and record errors are all
/// collected before returning, so the report lists every problem at once.
#[must_use]
pub fn validate(raw: &RawCollection) -> Validated {
    let mut errors = Vec::new();

    if parse_month(&raw.month_year).is_err() {
        errors.push(FieldError::new(
            "month_year",
            format!("'{}' is not a YYYY-MM month", raw.month_year),
        ));
    }
    if let Err(e) = DateRange::new(raw.date_range.since, raw.date_range.until) {
        errors.push(FieldError::new("date_range", e.to_string()));
    }
    if raw.account_id.trim().is_empty() {
        errors.push(FieldError::new("account_id", "must be non-empty"));
    }

    let campaigns = typed_records(raw, Dimension::Campaigns, &mut errors);
    let demographics = typed_records(raw, Dimension::Demographics, &mut errors);
    let regional = typed_records(raw, Dimension::Regional, &mut errors);
    let devices = typed_records(raw, Dimension::Devices, &mut errors);
    let platforms = typed_records(raw, Dimension::Platforms, &mut errors);
    let ad_level = typed_records(raw, Dimension::AdLevel, &mut errors);

    let warnings = business_warnings(raw);

    if !errors.is_empty() {
        return Validated {
            report: ValidationReport {
                is_valid: false,
                errors,
                warnings,
            },
            collection: None,
        };
    }

    let mut summary = raw.summary.clone();
    summary.total_records = raw.data.total_records();
    for warning in &warnings {
        if !summary.warnings.contains(warning) {
            summary.warnings.push(warning.clone());
        }
    }

    let collection = CollectionResult {
        account_id: raw.account_id.clone(),
        scraped_at: raw.scraped_at,
        date_range: raw.date_range,
        month_year: raw.month_year.clone(),
        campaigns,
        demographics,
        regional,
        devices,
        platforms,
        ad_level,
        summary,
    };

    Validated {
        report: ValidationReport {
            is_valid: true,
            errors: Vec::new(),
            warnings,
        },
        collection: Some(collection),
    }
}

fn business_warnings(raw: &RawCollection) -> Vec<String> {
    let mut warnings = Vec::new();
    if raw.data.total_records() == 0 {
        warnings.push("no records were collected".to_string());
    }
    let days = raw.date_range.days();
    if days > MAX_EXPECTED_RANGE_DAYS {
        warnings.push(format!(
            "date range spans {days} days, more than {MAX_EXPECTED_RANGE_DAYS}"
        ));
    }
    if !raw.summary.failed_endpoints.is_empty() {
        warnings.push(format!(
            "endpoints failed: {}",
            raw.summary.failed_endpoints.join(", ")
        ));
    }
    warnings
}

fn typed_records<R: DeserializeOwned>(
    raw: &RawCollection,
    dimension: Dimension,
    errors: &mut Vec<FieldError>,
) -> Vec<R> {
    let mut records = Vec::new();
    for (index, value) in raw.data.get(dimension).iter().enumerate() {
        let path = format!("{dimension}[{index}]");
        let before = errors.len();
        check_shape(dimension, value, &path, errors);
        if errors.len() > before {
            continue;
        }
        match serde_json::from_value::<R>(value.clone()) {
            Ok(record) => records.push(record),
            Err(e) => errors.push(FieldError::new(path, e.to_string())),
        }
    }
    records
}

fn check_shape(dimension: Dimension, value: &Value, path: &str, errors: &mut Vec<FieldError>) {
    let Some(object) = value.as_object() else {
        errors.push(FieldError::new(path, "expected an object"));
        return;
    };

    for field in key_fields(dimension) {
        match object.get(*field) {
            None | Some(Value::Null) => {
                errors.push(FieldError::new(format!("{path}.{field}"), "is required"));
            }
            Some(Value::String(_) | Value::Number(_)) => {}
            Some(_) => errors.push(FieldError::new(
                format!("{path}.{field}"),
                "must be a string or a number",
            )),
        }
    }

    for field in SCALAR_FIELDS {
        match object.get(field) {
            Some(Value::Bool(_) | Value::Array(_) | Value::Object(_)) => {
                errors.push(FieldError::new(
                    format!("{path}.{field}"),
                    "must be a number, a numeric string or null",
                ));
            }
            Some(value) if out_of_range(value) => {
                errors.push(FieldError::new(format!("{path}.{field}"), OUT_OF_RANGE));
            }
            _ => {}
        }
    }

    for field in ACTION_FIELDS {
        match object.get(field) {
            None | Some(Value::Null) => {}
            Some(Value::Array(entries)) => {
                for (i, entry) in entries.iter().enumerate() {
                    let has_type = entry
                        .get("action_type")
                        .or_else(|| entry.get("type"))
                        .is_some_and(Value::is_string);
                    if !has_type {
                        errors.push(FieldError::new(
                            format!("{path}.{field}[{i}]"),
                            "expected an object with a string action_type",
                        ));
                    } else if entry.get("value").is_some_and(out_of_range) {
                        errors.push(FieldError::new(
                            format!("{path}.{field}[{i}].value"),
                            OUT_OF_RANGE,
                        ));
                    }
                }
            }
            Some(_) => errors.push(FieldError::new(
                format!("{path}.{field}"),
                "must be an array or null",
            )),
        }
    }
}

const OUT_OF_RANGE: &str = "exceeds the largest storable metric";

/// A finite number, or numeric string, beyond [`MAX_METRIC_MAGNITUDE`].
/// Non-finite and unparseable values are left to [`clean`].
fn out_of_range(value: &Value) -> bool {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.is_some_and(|v| v.is_finite() && v.abs() > MAX_METRIC_MAGNITUDE)
}

/// Zero non-finite numerics and drop duplicate natural keys.
///
/// Applying `clean` to its own output changes nothing and records no
/// transformations.
#[must_use]
pub fn clean(collection: CollectionResult) -> Cleaned {
    let mut notes = Vec::new();
    let CollectionResult {
        account_id,
        scraped_at,
        date_range,
        month_year,
        campaigns,
        demographics,
        regional,
        devices,
        platforms,
        ad_level,
        mut summary,
    } = collection;

    let mut data = CollectionResult {
        account_id,
        scraped_at,
        date_range,
        month_year,
        campaigns: clean_dimension(campaigns, &mut notes),
        demographics: clean_dimension(demographics, &mut notes),
        regional: clean_dimension(regional, &mut notes),
        devices: clean_dimension(devices, &mut notes),
        platforms: clean_dimension(platforms, &mut notes),
        ad_level: clean_dimension(ad_level, &mut notes),
        summary: CollectionSummary::default(),
    };
    summary.total_records = data.total_records();
    data.summary = summary;

    Cleaned {
        data,
        transformations: notes,
    }
}

fn clean_dimension<R: DimensionRecord>(records: Vec<R>, notes: &mut Vec<String>) -> Vec<R> {
    let dimension = R::DIMENSION;
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(records.len());

    for (index, mut record) in records.into_iter().enumerate() {
        let metrics = record.metrics_mut();
        for (field, slot) in metrics.scalars_mut() {
            if let Some(v) = slot {
                if !v.is_finite() {
                    notes.push(format!(
                        "{dimension}[{index}].{field}: replaced {v} with 0"
                    ));
                    *v = 0.0;
                }
            }
        }
        for (field, list) in metrics.action_lists_mut() {
            for (i, entry) in list.iter_mut().enumerate() {
                if !entry.value.is_finite() {
                    notes.push(format!(
                        "{dimension}[{index}].{field}[{i}].value: replaced {} with 0",
                        entry.value
                    ));
                    entry.value = 0.0;
                }
            }
        }

        let key = record.natural_key();
        if seen.insert(key.clone()) {
            kept.push(record);
        } else {
            tracing::debug!(%dimension, key = %key, index, "dropping duplicate record");
            notes.push(format!(
                "{dimension}[{index}]: removed duplicate of key '{key}'"
            ));
        }
    }
    kept
}

#[cfg(test)]
#[path = "validate_test.rs"]
mod tests;
