//! Spend reconciliation.
//!
//! The insights API reports campaign-level spend as zero; real spend only
//! appears in account-level breakdowns. The authoritative total therefore
//! comes from demographics when any exist, and per-campaign spend is an
//! estimate: the total split evenly across active campaigns.

use adlens_core::{CampaignRecord, DemographicRecord};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

const MS_PER_DAY: f64 = 86_400_000.0;

/// Where the reconciled total came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SpendSource {
    Demographics,
    Campaigns,
    /// Neither demographics nor campaigns were collected; the total is 0.
    #[default]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reconciliation {
    pub total_spend: f64,
    pub source: SpendSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CampaignStatus {
    Active,
    Inactive,
}

/// A campaign with its estimated share of the reconciled spend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignAnalysis {
    pub id: String,
    pub name: String,
    /// Even share of the reconciled total, not the upstream campaign spend.
    pub spend: f64,
    pub objective: String,
    pub buying_type: Option<String>,
    pub optimization_goal: Option<String>,
    pub status: CampaignStatus,
    pub date_start: Option<String>,
    pub date_stop: Option<String>,
    /// Whole days between start and stop, rounded up.
    pub duration: Option<i64>,
}

/// Demographics first, campaigns as the fallback.
#[must_use]
pub fn reconcile(campaigns: &[CampaignRecord], demographics: &[DemographicRecord]) -> Reconciliation {
    if !demographics.is_empty() {
        return Reconciliation {
            total_spend: demographics.iter().map(|d| d.metrics.spend()).sum(),
            source: SpendSource::Demographics,
        };
    }
    if !campaigns.is_empty() {
        return Reconciliation {
            total_spend: campaigns.iter().map(|c| c.metrics.spend()).sum(),
            source: SpendSource::Campaigns,
        };
    }
    Reconciliation {
        total_spend: 0.0,
        source: SpendSource::None,
    }
}

/// The authoritative total spend for a collection.
#[must_use]
pub fn reconcile_spend(campaigns: &[CampaignRecord], demographics: &[DemographicRecord]) -> f64 {
    reconcile(campaigns, demographics).total_spend
}

/// A campaign counts as active when it has a real objective and a name.
fn is_active(campaign: &CampaignRecord) -> bool {
    let has_objective = campaign
        .objective
        .as_deref()
        .is_some_and(|o| !o.trim().is_empty() && o != "NONE");
    let has_name = campaign
        .campaign_name
        .as_deref()
        .is_some_and(|n| !n.trim().is_empty());
    has_objective && has_name
}

/// Split `total_spend` evenly across active campaigns.
///
/// Inactive campaigns get 0. Status follows the resulting spend. Output is
/// sorted by spend, descending; the sort is stable so equal spends keep
/// their input order.
#[must_use]
pub fn distribute_spend(campaigns: &[CampaignRecord], total_spend: f64) -> Vec<CampaignAnalysis> {
    let active_count = campaigns.iter().filter(|c| is_active(c)).count();
    #[allow(clippy::cast_precision_loss)]
    let share = if active_count == 0 {
        0.0
    } else {
        total_spend / active_count as f64
    };

    let mut analyses: Vec<CampaignAnalysis> = campaigns
        .iter()
        .map(|c| {
            let spend = if is_active(c) { share } else { 0.0 };
            CampaignAnalysis {
                id: c.campaign_id.clone(),
                name: c.campaign_name.clone().unwrap_or_default(),
                spend,
                objective: c
                    .objective
                    .clone()
                    .unwrap_or_else(|| "UNKNOWN".to_string()),
                buying_type: c.buying_type.clone(),
                optimization_goal: c.optimization_goal.clone(),
                status: if spend > 0.0 {
                    CampaignStatus::Active
                } else {
                    CampaignStatus::Inactive
                },
                date_start: c.date_start.clone(),
                date_stop: c.date_stop.clone(),
                duration: duration_days(c.date_start.as_deref(), c.date_stop.as_deref()),
            }
        })
        .collect();

    analyses.sort_by(|a, b| b.spend.total_cmp(&a.spend));
    analyses
}

/// Reconciled spend not assigned to any campaign. Zero whenever at least one
/// campaign is active; the whole total when none is.
#[must_use]
pub fn unallocated_spend(total_spend: f64, analyses: &[CampaignAnalysis]) -> f64 {
    let allocated: f64 = analyses.iter().map(|a| a.spend).sum();
    let rest = total_spend - allocated;
    if rest.abs() < 1e-6 {
        0.0
    } else {
        rest
    }
}

/// `ceil((stop - start) / 1 day)`, accepting plain dates or RFC 3339 timestamps.
#[must_use]
pub fn duration_days(start: Option<&str>, stop: Option<&str>) -> Option<i64> {
    let start = parse_instant(start?)?;
    let stop = parse_instant(stop?)?;
    #[allow(clippy::cast_precision_loss)]
    let ms = (stop - start).num_milliseconds() as f64;
    #[allow(clippy::cast_possible_truncation)]
    let days = (ms / MS_PER_DAY).ceil() as i64;
    Some(days)
}

fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn campaign(id: &str, objective: &str, name: &str) -> CampaignRecord {
        serde_json::from_value(json!({
            "campaign_id": id,
            "objective": objective,
            "campaign_name": name,
            "spend": "0"
        }))
        .unwrap()
    }

    fn demo(spend: f64) -> DemographicRecord {
        serde_json::from_value(json!({"age": "25-34", "gender": "female", "spend": spend}))
            .unwrap()
    }

    #[test]
    fn demographics_win_over_campaigns() {
        let campaigns = vec![campaign("c1", "LINK_CLICKS", "A")];
        let r = reconcile(&campaigns, &[demo(100.0), demo(50.0)]);
        assert!((r.total_spend - 150.0).abs() < 1e-9);
        assert_eq!(r.source, SpendSource::Demographics);
    }

    #[test]
    fn campaign_sum_is_the_fallback() {
        let campaigns: Vec<CampaignRecord> = vec![
            serde_json::from_value(json!({"campaign_id": "1", "spend": "50"})).unwrap(),
            serde_json::from_value(json!({"campaign_id": "2", "spend": "30"})).unwrap(),
        ];
        let r = reconcile(&campaigns, &[]);
        assert!((r.total_spend - 80.0).abs() < 1e-9);
        assert_eq!(r.source, SpendSource::Campaigns);
        assert!((reconcile_spend(&campaigns, &[]) - 80.0).abs() < 1e-9);
    }

    #[test]
    fn nothing_collected_reconciles_to_zero() {
        let r = reconcile(&[], &[]);
        assert_eq!(r.total_spend, 0.0);
        assert_eq!(r.source, SpendSource::None);
    }

    #[test]
    fn even_split_across_active_campaigns() {
        let campaigns = vec![
            campaign("c0", "NONE", ""),
            campaign("c1", "LINK_CLICKS", "A"),
            campaign("c2", "LINK_CLICKS", "B"),
        ];
        let analyses = distribute_spend(&campaigns, 200.0);

        assert_eq!(analyses.len(), 3);
        assert_eq!(analyses[0].id, "c1");
        assert_eq!(analyses[1].id, "c2");
        assert!((analyses[0].spend - 100.0).abs() < 1e-9);
        assert!((analyses[1].spend - 100.0).abs() < 1e-9);
        assert_eq!(analyses[0].status, CampaignStatus::Active);
        assert_eq!(analyses[2].id, "c0");
        assert_eq!(analyses[2].spend, 0.0);
        assert_eq!(analyses[2].status, CampaignStatus::Inactive);
    }

    #[test]
    fn named_campaign_without_objective_is_inactive() {
        let campaigns = vec![campaign("c1", "NONE", "Named"), campaign("c2", "REACH", " ")];
        let analyses = distribute_spend(&campaigns, 90.0);
        assert!(analyses.iter().all(|a| a.spend == 0.0));
        assert!((unallocated_spend(90.0, &analyses) - 90.0).abs() < 1e-9);
    }

    #[test]
    fn spend_is_conserved() {
        for active in 1..=7 {
            let campaigns: Vec<CampaignRecord> = (0..active)
                .map(|i| campaign(&format!("c{i}"), "CONVERSIONS", &format!("C{i}")))
                .chain(std::iter::once(campaign("x", "NONE", "")))
                .collect();
            for total in [0.0, 0.01, 100.0, 1234.57, 99_999.99] {
                let analyses = distribute_spend(&campaigns, total);
                let sum: f64 = analyses.iter().map(|a| a.spend).sum();
                assert!((sum - total).abs() < 1e-6, "total {total}, active {active}");
                assert_eq!(unallocated_spend(total, &analyses), 0.0);
            }
        }
    }

    #[test]
    fn zero_total_marks_everything_inactive() {
        let analyses = distribute_spend(&[campaign("c1", "REACH", "A")], 0.0);
        assert_eq!(analyses[0].status, CampaignStatus::Inactive);
    }

    #[test]
    fn duration_rounds_partial_days_up() {
        assert_eq!(duration_days(Some("2025-03-01"), Some("2025-03-31")), Some(30));
        assert_eq!(
            duration_days(Some("2025-03-01T00:00:00Z"), Some("2025-03-02T06:00:00Z")),
            Some(2)
        );
        assert_eq!(duration_days(Some("2025-03-01"), None), None);
        assert_eq!(duration_days(Some("soon"), Some("2025-03-01")), None);
    }
}
