//! Grouping by campaign objective.
//!
//! Upstream campaign rows carry no delivery metrics, so per-objective
//! engagement is an estimate: account-level demographic totals split by each
//! objective's share of the campaign count.

use std::collections::BTreeMap;

use adlens_core::DemographicRecord;
use serde::{Deserialize, Serialize};

use super::{ctr, percent, rank_desc, ratio, Totals};
use crate::reconcile::{CampaignAnalysis, CampaignStatus};

const ESTIMATE_BASIS: &str = "campaign_count_share";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupStatus {
    Active,
    Inactive,
    Mixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignTypeSummary {
    pub objective: String,
    pub total_spend: f64,
    pub count: usize,
    pub avg_spend: f64,
    /// Share of total campaign spend.
    pub percentage: f64,
    pub status: GroupStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectiveEngagement {
    pub objective: String,
    pub campaign_count: usize,
    /// Fraction of campaigns with this objective, in `[0, 1]`.
    pub share: f64,
    pub clicks: f64,
    pub impressions: f64,
    pub spend: f64,
    pub ctr: f64,
    pub estimated: bool,
    pub basis: String,
}

#[derive(Default)]
struct Group {
    spend: f64,
    count: usize,
    active: usize,
}

fn group_by_objective(campaigns: &[CampaignAnalysis]) -> BTreeMap<&str, Group> {
    let mut groups: BTreeMap<&str, Group> = BTreeMap::new();
    for c in campaigns {
        let group = groups.entry(c.objective.as_str()).or_default();
        group.spend += c.spend;
        group.count += 1;
        if c.status == CampaignStatus::Active {
            group.active += 1;
        }
    }
    groups
}

/// Per-objective spend summary, sorted by total spend descending.
#[must_use]
pub fn campaign_types(campaigns: &[CampaignAnalysis]) -> Vec<CampaignTypeSummary> {
    let groups = group_by_objective(campaigns);
    let total: f64 = groups.values().map(|g| g.spend).sum();

    let mut summaries: Vec<CampaignTypeSummary> = groups
        .into_iter()
        .map(|(objective, g)| {
            #[allow(clippy::cast_precision_loss)]
            let avg_spend = ratio(g.spend, g.count as f64);
            CampaignTypeSummary {
                objective: objective.to_string(),
                total_spend: g.spend,
                count: g.count,
                avg_spend,
                percentage: percent(g.spend, total),
                status: match g.active {
                    0 => GroupStatus::Inactive,
                    n if n == g.count => GroupStatus::Active,
                    _ => GroupStatus::Mixed,
                },
            }
        })
        .collect();
    summaries.sort_by(|a, b| rank_desc(a.total_spend, &a.objective, b.total_spend, &b.objective));
    summaries
}

/// Demographic totals apportioned by campaign-count share per objective.
#[must_use]
pub fn engagement_by_objective(
    campaigns: &[CampaignAnalysis],
    demographics: &[DemographicRecord],
) -> Vec<ObjectiveEngagement> {
    let totals = Totals::of(demographics.iter().map(|d| &d.metrics));
    let groups = group_by_objective(campaigns);
    #[allow(clippy::cast_precision_loss)]
    let campaign_total = campaigns.len() as f64;

    let mut rows: Vec<ObjectiveEngagement> = groups
        .into_iter()
        .map(|(objective, g)| {
            #[allow(clippy::cast_precision_loss)]
            let share = ratio(g.count as f64, campaign_total);
            let clicks = totals.clicks * share;
            let impressions = totals.impressions * share;
            ObjectiveEngagement {
                objective: objective.to_string(),
                campaign_count: g.count,
                share,
                clicks,
                impressions,
                spend: totals.spend * share,
                ctr: ctr(clicks, impressions),
                estimated: true,
                basis: ESTIMATE_BASIS.to_string(),
            }
        })
        .collect();
    rows.sort_by(|a, b| rank_desc(a.share, &a.objective, b.share, &b.objective));
    rows
}
