//! Per-region delivery.

use std::collections::BTreeMap;

use adlens_core::RegionalRecord;
use serde::{Deserialize, Serialize};

use super::{cpm, ctr, percent, rank_desc, ratio, Totals};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionStat {
    pub region: String,
    pub spend: f64,
    pub clicks: f64,
    pub impressions: f64,
    pub reach: f64,
    pub ctr: f64,
    pub cpc: f64,
    pub cpm: f64,
    /// Share of regional spend.
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Regional {
    pub total_spend: f64,
    /// Sorted by spend, descending.
    pub regions: Vec<RegionStat>,
    pub top_region: Option<String>,
    /// Regions with spend above zero.
    pub active_regions: usize,
}

#[must_use]
pub fn regional(records: &[RegionalRecord]) -> Regional {
    let mut by_region: BTreeMap<&str, Totals> = BTreeMap::new();
    for record in records {
        by_region
            .entry(record.region.as_str())
            .or_default()
            .add(&record.metrics);
    }
    let total_spend: f64 = by_region.values().map(|t| t.spend).sum();

    let mut regions: Vec<RegionStat> = by_region
        .into_iter()
        .map(|(region, t)| RegionStat {
            region: region.to_string(),
            spend: t.spend,
            clicks: t.clicks,
            impressions: t.impressions,
            reach: t.reach,
            ctr: ctr(t.clicks, t.impressions),
            cpc: ratio(t.spend, t.clicks),
            cpm: cpm(t.spend, t.impressions),
            percentage: percent(t.spend, total_spend),
        })
        .collect();
    regions.sort_by(|a, b| rank_desc(a.spend, &a.region, b.spend, &b.region));

    Regional {
        total_spend,
        top_region: regions.first().map(|r| r.region.clone()),
        active_regions: regions.iter().filter(|r| r.spend > 0.0).count(),
        regions,
    }
}
