//! Age and gender breakdowns.

use std::collections::BTreeMap;

use adlens_core::DemographicRecord;
use serde::{Deserialize, Serialize};

use super::{percent, round1, title_case};

const UNKNOWN_GENDER: &str = "unknown";

/// Years added to the base of an open-ended range such as `65+`.
const OPEN_RANGE_OFFSET: f64 = 5.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeBreakdown {
    pub age_range: String,
    pub spend: f64,
    /// Reach of the bucket.
    pub audience: f64,
    pub actions: f64,
    /// Share of demographic spend.
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenderBreakdown {
    pub gender: String,
    pub spend: f64,
    /// Reach of the bucket.
    pub count: f64,
    /// Share of demographic spend.
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Demographics {
    pub total_spend: f64,
    pub total_reach: f64,
    pub spend_by_age: BTreeMap<String, f64>,
    pub spend_by_gender: BTreeMap<String, f64>,
    /// Reach-weighted mean of age-range midpoints, one decimal.
    pub average_age: Option<f64>,
    pub primary_gender: Option<String>,
    pub age_breakdown: Vec<AgeBreakdown>,
    pub gender_breakdown: Vec<GenderBreakdown>,
}

#[derive(Default)]
struct Bucket {
    spend: f64,
    reach: f64,
    actions: f64,
}

/// Midpoint of `lo-hi` rounded half-up, or `N + 5` for `N+`.
#[must_use]
pub fn age_midpoint(range: &str) -> Option<f64> {
    let range = range.trim();
    if let Some(base) = range.strip_suffix('+') {
        return base.trim().parse::<f64>().ok().map(|b| b + OPEN_RANGE_OFFSET);
    }
    let (lo, hi) = range.split_once('-')?;
    let lo = lo.trim().parse::<f64>().ok()?;
    let hi = hi.trim().parse::<f64>().ok()?;
    Some(((lo + hi) / 2.0 + 0.5).floor())
}

fn display_gender(raw: &str) -> String {
    if raw.trim().is_empty() {
        title_case(UNKNOWN_GENDER)
    } else {
        title_case(raw)
    }
}

#[must_use]
pub fn demographics(records: &[DemographicRecord]) -> Demographics {
    let mut by_age: BTreeMap<String, Bucket> = BTreeMap::new();
    let mut by_gender: BTreeMap<String, Bucket> = BTreeMap::new();
    let mut weighted_age = 0.0;
    let mut age_weight = 0.0;

    for record in records {
        let m = &record.metrics;
        let age = by_age.entry(record.age.clone()).or_default();
        age.spend += m.spend();
        age.reach += m.reach();
        age.actions += m.actions_total();

        let gender = by_gender
            .entry(record.gender.trim().to_lowercase())
            .or_default();
        gender.spend += m.spend();
        gender.reach += m.reach();

        if let Some(mid) = age_midpoint(&record.age) {
            if m.reach() > 0.0 {
                weighted_age += mid * m.reach();
                age_weight += m.reach();
            }
        }
    }

    let total_spend: f64 = by_age.values().map(|b| b.spend).sum();
    let total_reach: f64 = by_age.values().map(|b| b.reach).sum();

    let age_breakdown = by_age
        .iter()
        .map(|(range, b)| AgeBreakdown {
            age_range: range.clone(),
            spend: b.spend,
            audience: b.reach,
            actions: b.actions,
            percentage: percent(b.spend, total_spend),
        })
        .collect();

    let gender_breakdown = by_gender
        .iter()
        .map(|(gender, b)| GenderBreakdown {
            gender: display_gender(gender),
            spend: b.spend,
            count: b.reach,
            percentage: percent(b.spend, total_spend),
        })
        .collect();

    Demographics {
        total_spend,
        total_reach,
        spend_by_age: by_age.iter().map(|(k, b)| (k.clone(), b.spend)).collect(),
        spend_by_gender: by_gender
            .iter()
            .map(|(k, b)| (display_gender(k), b.spend))
            .collect(),
        average_age: (age_weight > 0.0).then(|| round1(weighted_age / age_weight)),
        primary_gender: primary_gender(&by_gender),
        age_breakdown,
        gender_breakdown,
    }
}

/// Highest-reach gender, preferring known genders over `unknown`.
fn primary_gender(by_gender: &BTreeMap<String, Bucket>) -> Option<String> {
    let best = |known_only: bool| {
        by_gender
            .iter()
            .filter(|(g, b)| b.reach > 0.0 && (!known_only || is_known(g)))
            // BTreeMap order makes the first maximum the alphabetically first.
            .fold(None, |best: Option<(&String, f64)>, (g, b)| match best {
                Some((_, reach)) if reach >= b.reach => best,
                _ => Some((g, b.reach)),
            })
            .map(|(g, _)| display_gender(g))
    };
    best(true).or_else(|| best(false))
}

fn is_known(gender: &str) -> bool {
    !gender.is_empty() && gender != UNKNOWN_GENDER
}
