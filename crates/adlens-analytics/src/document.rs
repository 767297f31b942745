//! The per-client analytics document.

use adlens_core::CollectionResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::ad_level::{ad_level, AdSummary};
use crate::aggregate::audience::{audience_profile, AudienceProfile};
use crate::aggregate::demographics::{demographics, Demographics};
use crate::aggregate::devices::{devices_and_platforms, DevicesAndPlatforms};
use crate::aggregate::engagement::{engagement, Engagement};
use crate::aggregate::objectives::{
    campaign_types, engagement_by_objective, CampaignTypeSummary, ObjectiveEngagement,
};
use crate::aggregate::overview::{overview, Overview};
use crate::aggregate::regional::{regional, Regional};
use crate::reconcile::{distribute_spend, reconcile, CampaignAnalysis};

/// Which breakdowns contributed at least one record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataAvailability {
    pub campaigns: bool,
    pub demographics: bool,
    pub regional: bool,
    pub devices: bool,
    pub platforms: bool,
    pub ad_level: bool,
}

impl DataAvailability {
    #[must_use]
    pub fn of(collection: &CollectionResult) -> Self {
        Self {
            campaigns: !collection.campaigns.is_empty(),
            demographics: !collection.demographics.is_empty(),
            regional: !collection.regional.is_empty(),
            devices: !collection.devices.is_empty(),
            platforms: !collection.platforms.is_empty(),
            ad_level: !collection.ad_level.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsDocument {
    pub client_id: i64,
    pub month_year: String,
    pub processed_at: DateTime<Utc>,
    pub source_data_id: i64,
    pub overview: Overview,
    pub campaigns: Vec<CampaignAnalysis>,
    pub demographics: Demographics,
    pub regional: Regional,
    pub engagement: Engagement,
    pub campaign_types: Vec<CampaignTypeSummary>,
    pub engagement_by_objective: Vec<ObjectiveEngagement>,
    pub devices_and_platforms: DevicesAndPlatforms,
    pub audience_profile: AudienceProfile,
    pub ad_level: Vec<AdSummary>,
    pub data_availability: DataAvailability,
}

/// Run every aggregator over a cleaned collection.
///
/// Deterministic: the same collection and `processed_at` always yield an
/// equal document.
#[must_use]
pub fn assemble(
    collection: &CollectionResult,
    client_id: i64,
    source_data_id: i64,
    processed_at: DateTime<Utc>,
) -> AnalyticsDocument {
    let reconciliation = reconcile(&collection.campaigns, &collection.demographics);
    let campaigns = distribute_spend(&collection.campaigns, reconciliation.total_spend);

    AnalyticsDocument {
        client_id,
        month_year: collection.month_year.clone(),
        processed_at,
        source_data_id,
        overview: overview(collection, &reconciliation, &campaigns),
        demographics: demographics(&collection.demographics),
        regional: regional(&collection.regional),
        engagement: engagement(collection, reconciliation.total_spend),
        campaign_types: campaign_types(&campaigns),
        engagement_by_objective: engagement_by_objective(&campaigns, &collection.demographics),
        devices_and_platforms: devices_and_platforms(&collection.devices, &collection.platforms),
        audience_profile: audience_profile(collection, &campaigns),
        ad_level: ad_level(&collection.ad_level),
        data_availability: DataAvailability::of(collection),
        campaigns,
    }
}

#[cfg(test)]
mod tests {
    use adlens_core::{CollectionSummary, DateRange};
    use chrono::{NaiveDate, TimeZone};
    use serde_json::json;

    use super::*;
    use crate::aggregate::overview::MetricSource;
    use crate::reconcile::SpendSource;

    fn sample() -> CollectionResult {
        CollectionResult {
            account_id: "123".to_string(),
            scraped_at: Utc.with_ymd_and_hms(2025, 3, 31, 6, 0, 0).unwrap(),
            date_range: DateRange {
                since: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
                until: NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
            },
            month_year: "2025-03".to_string(),
            campaigns: serde_json::from_value(json!([
                {"campaign_id": "c1", "campaign_name": "Spring", "objective": "LINK_CLICKS", "spend": "0"},
                {"campaign_id": "c2", "campaign_name": "Brand", "objective": "REACH", "spend": "0"},
                {"campaign_id": "c3", "campaign_name": "", "objective": "NONE", "spend": "0"}
            ]))
            .unwrap(),
            demographics: serde_json::from_value(json!([
                {"age": "25-34", "gender": "female", "spend": "100", "reach": "1000",
                 "clicks": "30", "impressions": "3000"},
                {"age": "35-44", "gender": "male", "spend": "50", "reach": "500",
                 "clicks": "10", "impressions": "2000"}
            ]))
            .unwrap(),
            regional: serde_json::from_value(json!([
                {"region": "Texas", "spend": "90", "clicks": "25", "impressions": "3000"}
            ]))
            .unwrap(),
            devices: serde_json::from_value(json!([
                {"device_platform": "mobile_app", "spend": 700},
                {"device_platform": "desktop", "spend": 300}
            ]))
            .unwrap(),
            platforms: vec![],
            ad_level: vec![],
            summary: CollectionSummary::default(),
        }
    }

    #[test]
    fn document_combines_every_aggregator() {
        let at = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
        let doc = assemble(&sample(), 7, 42, at);

        assert_eq!(doc.client_id, 7);
        assert_eq!(doc.source_data_id, 42);
        assert_eq!(doc.month_year, "2025-03");
        assert!((doc.overview.total_spend - 150.0).abs() < 1e-9);
        assert_eq!(doc.overview.spend_source, SpendSource::Demographics);
        assert_eq!(doc.overview.metric_source, MetricSource::Demographics);
        assert_eq!(doc.overview.active_campaigns, 2);
        assert_eq!(doc.overview.total_campaigns, 3);
        assert_eq!(doc.overview.unallocated_spend, 0.0);
        assert!((doc.campaigns[0].spend - 75.0).abs() < 1e-9);
        assert_eq!(doc.demographics.primary_gender.as_deref(), Some("Female"));
        assert_eq!(doc.demographics.average_age, Some(33.3));
        assert!((doc.devices_and_platforms.mobile_share - 70.0).abs() < 1e-9);
        assert!((doc.engagement.ctr - 0.8).abs() < 1e-9);
        assert!(doc.audience_profile.available);
        assert_eq!(
            doc.data_availability,
            DataAvailability {
                campaigns: true,
                demographics: true,
                regional: true,
                devices: true,
                platforms: false,
                ad_level: false,
            }
        );
    }

    #[test]
    fn assembly_is_deterministic() {
        let at = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
        let first = serde_json::to_string(&assemble(&sample(), 1, 1, at)).unwrap();
        let second = serde_json::to_string(&assemble(&sample(), 1, 1, at)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn serialized_keys_are_camel_case() {
        let at = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
        let value = serde_json::to_value(assemble(&sample(), 1, 1, at)).unwrap();
        for key in [
            "overview",
            "campaignTypes",
            "devicesAndPlatforms",
            "audienceProfile",
            "adLevel",
            "dataAvailability",
            "monthYear",
            "processedAt",
            "sourceDataId",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["overview"]["spendSource"], "demographics");
    }

    #[test]
    fn percentages_stay_in_bounds() {
        let at = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
        let doc = assemble(&sample(), 1, 1, at);
        let percentages = doc
            .demographics
            .age_breakdown
            .iter()
            .map(|a| a.percentage)
            .chain(doc.demographics.gender_breakdown.iter().map(|g| g.percentage))
            .chain(doc.regional.regions.iter().map(|r| r.percentage))
            .chain(doc.campaign_types.iter().map(|t| t.percentage))
            .chain(doc.devices_and_platforms.devices.iter().map(|d| d.percentage));
        for p in percentages {
            assert!((0.0..=100.0).contains(&p), "{p} out of bounds");
        }
    }
}
