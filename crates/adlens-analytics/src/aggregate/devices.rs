//! Device and placement breakdowns.

use std::collections::BTreeMap;

use adlens_core::{DeviceRecord, PlatformRecord};
use serde::{Deserialize, Serialize};

use super::{ctr, percent, rank_desc, ratio, title_case, Totals};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryStat {
    pub name: String,
    pub spend: f64,
    pub clicks: f64,
    pub impressions: f64,
    pub ctr: f64,
    pub cpc: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevicesAndPlatforms {
    pub devices: Vec<DeliveryStat>,
    pub platforms: Vec<DeliveryStat>,
    /// Percent of device spend on devices whose raw name contains `mobile`.
    pub mobile_share: f64,
    /// Mean CTR over device and platform entries with a CTR above zero.
    pub average_ctr: f64,
    pub top_device: Option<String>,
}

/// `instagram` + `instagram_stories` -> `Instagram Stories`.
#[must_use]
pub fn platform_display_name(publisher: &str, position: &str) -> String {
    let platform = title_case(publisher);
    let readable = title_case(position);
    let placement = readable
        .strip_prefix(&platform)
        .filter(|rest| rest.is_empty() || rest.starts_with(' '))
        .map_or(readable.as_str(), str::trim_start);
    if placement.is_empty() {
        platform
    } else {
        format!("{platform} {placement}")
    }
}

fn stats(groups: BTreeMap<String, Totals>) -> Vec<DeliveryStat> {
    let total: f64 = groups.values().map(|t| t.spend).sum();
    let mut stats: Vec<DeliveryStat> = groups
        .into_iter()
        .map(|(name, t)| DeliveryStat {
            name,
            spend: t.spend,
            clicks: t.clicks,
            impressions: t.impressions,
            ctr: ctr(t.clicks, t.impressions),
            cpc: ratio(t.spend, t.clicks),
            percentage: percent(t.spend, total),
        })
        .collect();
    stats.sort_by(|a, b| rank_desc(a.spend, &a.name, b.spend, &b.name));
    stats
}

#[must_use]
pub fn devices_and_platforms(
    devices: &[DeviceRecord],
    platforms: &[PlatformRecord],
) -> DevicesAndPlatforms {
    let mut device_groups: BTreeMap<String, Totals> = BTreeMap::new();
    let mut device_total = 0.0;
    let mut mobile_spend = 0.0;
    for d in devices {
        device_groups
            .entry(title_case(&d.device_platform))
            .or_default()
            .add(&d.metrics);
        device_total += d.metrics.spend();
        if d.device_platform.to_lowercase().contains("mobile") {
            mobile_spend += d.metrics.spend();
        }
    }

    let mut platform_groups: BTreeMap<String, Totals> = BTreeMap::new();
    for p in platforms {
        platform_groups
            .entry(platform_display_name(&p.publisher_platform, &p.platform_position))
            .or_default()
            .add(&p.metrics);
    }

    let devices = stats(device_groups);
    let platforms = stats(platform_groups);

    let ctrs: Vec<f64> = devices
        .iter()
        .chain(&platforms)
        .map(|s| s.ctr)
        .filter(|c| *c > 0.0)
        .collect();
    #[allow(clippy::cast_precision_loss)]
    let average_ctr = ratio(ctrs.iter().sum(), ctrs.len() as f64);

    DevicesAndPlatforms {
        mobile_share: percent(mobile_spend, device_total),
        average_ctr,
        top_device: devices.first().map(|d| d.name.clone()),
        devices,
        platforms,
    }
}
