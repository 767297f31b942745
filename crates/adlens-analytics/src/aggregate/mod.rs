//! Per-dimension aggregators.
//!
//! Every aggregator is a pure function over cleaned records. Shared rules:
//! missing metrics count as 0, [`percent`] never leaves `[0, 100]` and yields
//! 0 for an empty denominator, rankings sort descending and break ties by
//! name, and grouped output uses ordered maps so repeated runs are identical.

pub mod ad_level;
pub mod audience;
pub mod demographics;
pub mod devices;
pub mod engagement;
pub mod objectives;
pub mod overview;
pub mod regional;

use std::cmp::Ordering;

/// `part / total * 100`, clamped to `[0, 100]`; 0 when `total <= 0`.
#[must_use]
pub fn percent(part: f64, total: f64) -> f64 {
    if !total.is_finite() || total <= 0.0 || !part.is_finite() {
        return 0.0;
    }
    (part / total * 100.0).clamp(0.0, 100.0)
}

/// `numerator / denominator`, or 0 when the denominator is not positive.
#[must_use]
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 && numerator.is_finite() {
        let value = numerator / denominator;
        if value.is_finite() {
            value
        } else {
            0.0
        }
    } else {
        0.0
    }
}

/// Click-through rate in percent.
#[must_use]
pub fn ctr(clicks: f64, impressions: f64) -> f64 {
    percent(clicks, impressions)
}

/// Cost per thousand impressions.
#[must_use]
pub fn cpm(spend: f64, impressions: f64) -> f64 {
    ratio(spend, impressions) * 1000.0
}

#[must_use]
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Descending by `metric`, ascending by `name` on ties.
pub(crate) fn rank_desc(a_metric: f64, a_name: &str, b_metric: f64, b_name: &str) -> Ordering {
    b_metric
        .total_cmp(&a_metric)
        .then_with(|| a_name.cmp(b_name))
}

/// `mobile_app` -> `Mobile App`.
#[must_use]
pub fn title_case(raw: &str) -> String {
    raw.replace('_', " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Running totals of the four core metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct Totals {
    pub spend: f64,
    pub clicks: f64,
    pub impressions: f64,
    pub reach: f64,
}

impl Totals {
    pub fn add(&mut self, metrics: &adlens_core::Metrics) {
        self.spend += metrics.spend();
        self.clicks += metrics.clicks();
        self.impressions += metrics.impressions();
        self.reach += metrics.reach();
    }

    pub fn of<'a>(metrics: impl IntoIterator<Item = &'a adlens_core::Metrics>) -> Self {
        let mut totals = Self::default();
        for m in metrics {
            totals.add(m);
        }
        totals
    }
}
