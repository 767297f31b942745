//! Headline totals.

use adlens_core::CollectionResult;
use serde::{Deserialize, Serialize};

use super::Totals;
use crate::reconcile::{
    unallocated_spend, CampaignAnalysis, CampaignStatus, Reconciliation, SpendSource,
};

/// Which breakdown the delivery totals were summed from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricSource {
    Demographics,
    AdLevel,
    #[default]
    None,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_spend: f64,
    pub spend_source: SpendSource,
    /// Reconciled spend not assigned to any active campaign.
    pub unallocated_spend: f64,
    pub active_campaigns: usize,
    pub total_campaigns: usize,
    pub total_ads: usize,
    pub total_impressions: f64,
    pub total_clicks: f64,
    pub total_reach: f64,
    pub metric_source: MetricSource,
}

/// Delivery totals: demographics when present, ad-level otherwise.
pub(crate) fn delivery_totals(collection: &CollectionResult) -> (Totals, MetricSource) {
    if !collection.demographics.is_empty() {
        (
            Totals::of(collection.demographics.iter().map(|d| &d.metrics)),
            MetricSource::Demographics,
        )
    } else if !collection.ad_level.is_empty() {
        (
            Totals::of(collection.ad_level.iter().map(|a| &a.metrics)),
            MetricSource::AdLevel,
        )
    } else {
        (Totals::default(), MetricSource::None)
    }
}

#[must_use]
pub fn overview(
    collection: &CollectionResult,
    reconciliation: &Reconciliation,
    campaigns: &[CampaignAnalysis],
) -> Overview {
    let (totals, metric_source) = delivery_totals(collection);
    Overview {
        total_spend: reconciliation.total_spend,
        spend_source: reconciliation.source,
        unallocated_spend: unallocated_spend(reconciliation.total_spend, campaigns),
        active_campaigns: campaigns
            .iter()
            .filter(|c| c.status == CampaignStatus::Active)
            .count(),
        total_campaigns: campaigns.len(),
        total_ads: collection.ad_level.len(),
        total_impressions: totals.impressions,
        total_clicks: totals.clicks,
        total_reach: totals.reach,
        metric_source,
    }
}
