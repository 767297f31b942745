//! Per-ad delivery.

use adlens_core::AdRecord;
use serde::{Deserialize, Serialize};

use super::{ctr, rank_desc, ratio};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdSummary {
    pub ad_id: String,
    pub ad_name: Option<String>,
    pub campaign_id: Option<String>,
    pub spend: f64,
    pub impressions: f64,
    pub clicks: f64,
    pub ctr: f64,
    pub cpc: f64,
    pub actions: f64,
}

/// Sorted by spend descending, ties by ad id.
#[must_use]
pub fn ad_level(records: &[AdRecord]) -> Vec<AdSummary> {
    let mut ads: Vec<AdSummary> = records
        .iter()
        .map(|a| {
            let m = &a.metrics;
            AdSummary {
                ad_id: a.ad_id.clone(),
                ad_name: a.ad_name.clone(),
                campaign_id: a.campaign_id.clone(),
                spend: m.spend(),
                impressions: m.impressions(),
                clicks: m.clicks(),
                ctr: ctr(m.clicks(), m.impressions()),
                cpc: ratio(m.spend(), m.clicks()),
                actions: m.actions_total(),
            }
        })
        .collect();
    ads.sort_by(|a, b| rank_desc(a.spend, &a.ad_id, b.spend, &b.ad_id));
    ads
}
