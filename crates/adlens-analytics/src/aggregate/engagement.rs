//! Click and conversion rates.

use adlens_core::{ActionValue, CollectionResult};
use serde::{Deserialize, Serialize};

use super::overview::{delivery_totals, MetricSource};
use super::{ctr, percent, ratio};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Engagement {
    pub total_clicks: f64,
    pub total_impressions: f64,
    pub ctr: f64,
    pub avg_cpc: f64,
    /// Ad-level actions per ad-level impression, in percent.
    pub engagement_rate: Option<f64>,
    pub total_actions: Option<f64>,
    pub conversions: Option<f64>,
    pub conversion_value: Option<f64>,
    pub roas: Option<f64>,
    pub source: MetricSource,
}

fn list_total(list: &[ActionValue]) -> f64 {
    list.iter().map(|a| a.value).sum()
}

/// `total_spend` is the reconciled total, used for `avg_cpc` and `roas`.
#[must_use]
pub fn engagement(collection: &CollectionResult, total_spend: f64) -> Engagement {
    let (totals, source) = delivery_totals(collection);
    let ads = &collection.ad_level;

    let (engagement_rate, total_actions) = if ads.is_empty() {
        (None, None)
    } else {
        let actions: f64 = ads.iter().map(|a| a.metrics.actions_total()).sum();
        let impressions: f64 = ads.iter().map(|a| a.metrics.impressions()).sum();
        (Some(percent(actions, impressions)), Some(actions))
    };

    let has_conversions = ads.iter().any(|a| !a.metrics.conversions.is_empty());
    let has_values = ads.iter().any(|a| !a.metrics.action_values.is_empty());
    let conversions: Option<f64> = has_conversions
        .then(|| ads.iter().map(|a| list_total(&a.metrics.conversions)).sum());
    let conversion_value: Option<f64> = has_values
        .then(|| ads.iter().map(|a| list_total(&a.metrics.action_values)).sum());
    let roas = conversion_value.map(|value| ratio(value, total_spend));

    Engagement {
        total_clicks: totals.clicks,
        total_impressions: totals.impressions,
        ctr: ctr(totals.clicks, totals.impressions),
        avg_cpc: ratio(total_spend, totals.clicks),
        engagement_rate,
        total_actions,
        conversions,
        conversion_value,
        roas,
        source,
    }
}
