//! Cross-dimension audience profile and recommendations.

use std::collections::BTreeMap;

use adlens_core::CollectionResult;
use serde::{Deserialize, Serialize};

use super::{ctr, rank_desc, ratio, title_case, Totals};
use crate::reconcile::CampaignAnalysis;

const TOP_SEGMENTS: usize = 5;
const TOP_REGIONS: usize = 5;
const TOP_OBJECTIVES: usize = 3;
const TOP_DEVICES: usize = 3;
const TOP_CAMPAIGNS: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProfileKind {
    /// Built from demographic and regional breakdowns.
    Full,
    /// Only campaign rows were collected.
    CampaignOnly,
    #[default]
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Impact {
    High,
    Medium,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub action: String,
    pub reason: String,
    pub impact: Impact,
}

/// One ranked entry. `score` is whatever the list is ranked by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedEntry {
    pub name: String,
    pub spend: f64,
    pub ctr: f64,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudienceProfile {
    pub available: bool,
    pub kind: ProfileKind,
    pub top_segments: Vec<RankedEntry>,
    pub top_regions: Vec<RankedEntry>,
    pub top_objectives: Vec<RankedEntry>,
    pub top_devices: Vec<RankedEntry>,
    pub top_campaigns: Vec<RankedEntry>,
    pub recommendations: Vec<Recommendation>,
}

fn ranked(mut entries: Vec<RankedEntry>, limit: usize) -> Vec<RankedEntry> {
    entries.sort_by(|a, b| rank_desc(a.score, &a.name, b.score, &b.name));
    entries.truncate(limit);
    entries
}

fn from_groups(
    groups: BTreeMap<String, Totals>,
    score: impl Fn(&Totals) -> f64,
    limit: usize,
) -> Vec<RankedEntry> {
    let entries = groups
        .into_iter()
        .map(|(name, t)| RankedEntry {
            score: score(&t),
            spend: t.spend,
            ctr: ctr(t.clicks, t.impressions),
            name,
        })
        .collect();
    ranked(entries, limit)
}

/// `ctr * ln(spend + 1)`: efficient segments with real volume rank first.
fn segment_score(t: &Totals) -> f64 {
    ctr(t.clicks, t.impressions) * (t.spend.max(0.0) + 1.0).ln()
}

fn top_objectives(campaigns: &[CampaignAnalysis]) -> Vec<RankedEntry> {
    let mut groups: BTreeMap<&str, (usize, f64)> = BTreeMap::new();
    for c in campaigns {
        let entry = groups.entry(c.objective.as_str()).or_default();
        entry.0 += 1;
        entry.1 += c.spend;
    }
    let entries = groups
        .into_iter()
        .map(|(objective, (count, spend))| {
            #[allow(clippy::cast_precision_loss)]
            let efficiency = ratio(count as f64, spend) * 1000.0;
            RankedEntry {
                name: objective.to_string(),
                spend,
                ctr: 0.0,
                score: efficiency,
            }
        })
        .collect();
    ranked(entries, TOP_OBJECTIVES)
}

fn top_campaigns(campaigns: &[CampaignAnalysis]) -> Vec<RankedEntry> {
    let entries = campaigns
        .iter()
        .map(|c| RankedEntry {
            name: if c.name.is_empty() { c.id.clone() } else { c.name.clone() },
            spend: c.spend,
            ctr: 0.0,
            score: c.spend,
        })
        .collect();
    ranked(entries, TOP_CAMPAIGNS)
}

/// Build the profile. Segment and region lists are filled from whichever of
/// demographics and regional exist.
#[must_use]
pub fn audience_profile(
    collection: &CollectionResult,
    campaigns: &[CampaignAnalysis],
) -> AudienceProfile {
    let has_breakdowns = !collection.demographics.is_empty() || !collection.regional.is_empty();
    if !has_breakdowns && campaigns.is_empty() {
        return AudienceProfile::default();
    }
    if !has_breakdowns {
        return campaign_only(campaigns);
    }

    let mut segments: BTreeMap<String, Totals> = BTreeMap::new();
    for d in &collection.demographics {
        segments
            .entry(format!("{} {}", title_case(&d.gender), d.age))
            .or_default()
            .add(&d.metrics);
    }
    let mut regions: BTreeMap<String, Totals> = BTreeMap::new();
    for r in &collection.regional {
        regions.entry(r.region.clone()).or_default().add(&r.metrics);
    }
    let mut devices: BTreeMap<String, Totals> = BTreeMap::new();
    for d in &collection.devices {
        devices
            .entry(title_case(&d.device_platform))
            .or_default()
            .add(&d.metrics);
    }

    let top_segments = from_groups(segments, segment_score, TOP_SEGMENTS);
    let top_regions = from_groups(regions, |t| ctr(t.clicks, t.impressions), TOP_REGIONS);
    let top_devices = from_groups(devices, |t| t.spend, TOP_DEVICES);

    let mut recommendations = Vec::new();
    if let Some(segment) = top_segments.first() {
        recommendations.push(Recommendation {
            action: format!("Scale budget toward {}", segment.name),
            reason: format!("best CTR-to-volume balance at {:.2}% CTR", segment.ctr),
            impact: Impact::High,
        });
    }
    if let Some(region) = top_regions.first() {
        recommendations.push(Recommendation {
            action: format!("Focus delivery on {}", region.name),
            reason: format!("highest regional CTR at {:.2}%", region.ctr),
            impact: Impact::Medium,
        });
    }
    if let Some(device) = top_devices.first() {
        recommendations.push(Recommendation {
            action: format!("Optimize creative for {}", device.name),
            reason: format!("largest share of device spend ({:.2})", device.spend),
            impact: Impact::Medium,
        });
    }

    AudienceProfile {
        available: true,
        kind: ProfileKind::Full,
        top_segments,
        top_regions,
        top_objectives: top_objectives(campaigns),
        top_devices,
        top_campaigns: Vec::new(),
        recommendations,
    }
}

fn campaign_only(campaigns: &[CampaignAnalysis]) -> AudienceProfile {
    let top_objectives = top_objectives(campaigns);
    let top_campaigns = top_campaigns(campaigns);

    let mut recommendations = Vec::new();
    if let Some(campaign) = top_campaigns.first().filter(|c| c.spend > 0.0) {
        recommendations.push(Recommendation {
            action: format!("Review results of {}", campaign.name),
            reason: "largest estimated spend; breakdown data was not collected".to_string(),
            impact: Impact::Medium,
        });
    }

    AudienceProfile {
        available: true,
        kind: ProfileKind::CampaignOnly,
        top_objectives,
        top_campaigns,
        recommendations,
        ..AudienceProfile::default()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::reconcile::CampaignStatus;
    use adlens_core::{CollectionSummary, DateRange};

    fn collection(demographics: serde_json::Value, regional: serde_json::Value) -> CollectionResult {
        CollectionResult {
            account_id: "1".to_string(),
            scraped_at: Utc.with_ymd_and_hms(2025, 3, 31, 0, 0, 0).unwrap(),
            date_range: DateRange {
                since: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
                until: NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
            },
            month_year: "2025-03".to_string(),
            campaigns: vec![],
            demographics: serde_json::from_value(demographics).unwrap(),
            regional: serde_json::from_value(regional).unwrap(),
            devices: vec![],
            platforms: vec![],
            ad_level: vec![],
            summary: CollectionSummary::default(),
        }
    }

    fn analysis(id: &str, objective: &str, spend: f64) -> CampaignAnalysis {
        CampaignAnalysis {
            id: id.to_string(),
            name: format!("Campaign {id}"),
            spend,
            objective: objective.to_string(),
            buying_type: None,
            optimization_goal: None,
            status: CampaignStatus::Active,
            date_start: None,
            date_stop: None,
            duration: None,
        }
    }

    #[test]
    fn nothing_collected_is_unavailable() {
        let profile = audience_profile(&collection(json!([]), json!([])), &[]);
        assert!(!profile.available);
        assert_eq!(profile.kind, ProfileKind::Unavailable);
    }

    #[test]
    fn segment_score_rewards_volume_and_efficiency() {
        let c = collection(
            json!([
                // 2% CTR on tiny spend
                {"age": "18-24", "gender": "male", "spend": "1", "clicks": "2", "impressions": "100"},
                // 1% CTR on real spend
                {"age": "25-34", "gender": "female", "spend": "500", "clicks": "10", "impressions": "1000"}
            ]),
            json!([
                {"region": "Ohio", "clicks": "1", "impressions": "100"},
                {"region": "Iowa", "clicks": "5", "impressions": "100"}
            ]),
        );
        let profile = audience_profile(&c, &[]);
        assert_eq!(profile.kind, ProfileKind::Full);
        assert_eq!(profile.top_segments[0].name, "Female 25-34");
        assert_eq!(profile.top_regions[0].name, "Iowa");
        assert_eq!(profile.recommendations[0].impact, Impact::High);
        assert_eq!(profile.recommendations[1].impact, Impact::Medium);
    }

    #[test]
    fn campaign_only_profile_ranks_campaigns() {
        let profile = audience_profile(
            &collection(json!([]), json!([])),
            &[analysis("1", "REACH", 10.0), analysis("2", "LINK_CLICKS", 30.0)],
        );
        assert!(profile.available);
        assert_eq!(profile.kind, ProfileKind::CampaignOnly);
        assert_eq!(profile.top_campaigns[0].name, "Campaign 2");
        assert!(profile.top_segments.is_empty());
        // 1 campaign per 10 spend beats 1 per 30.
        assert_eq!(profile.top_objectives[0].name, "REACH");
        assert_eq!(profile.recommendations.len(), 1);
    }

    #[test]
    fn lists_are_capped() {
        let records: Vec<serde_json::Value> = (0..8)
            .map(|i| json!({"region": format!("R{i}"), "clicks": "1", "impressions": "10"}))
            .collect();
        let profile = audience_profile(&collection(json!([]), json!(records)), &[]);
        assert_eq!(profile.top_regions.len(), 5);
        assert_eq!(profile.top_regions[0].name, "R0");
    }
}
