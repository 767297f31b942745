//! Typed breakdown records as returned by the ads platform insights API.
//!
//! ## Observed upstream shape
//!
//! Every metric arrives as a decimal *string* (`"spend": "12.34"`), occasionally
//! as a JSON number when records were re-exported, and sometimes as `null`.
//! [`Metrics`] accepts all three and keeps `None` for "not reported" so the
//! aggregators can tell a missing metric from a real zero.
//!
//! Campaign-level `spend` is reported as `"0"` by the insights endpoint even
//! for campaigns that spent; real spend only shows up in account-level
//! breakdowns (demographics, regional, ...). The records keep the upstream
//! value untouched; reconciliation happens in the analytics crate.
//!
//! `actions`, `action_values` and `conversions` are lists of
//! `{"action_type": "...", "value": "..."}`. They are carried through as
//! [`ActionValue`] entries without interpreting the action type.

use serde::{Deserialize, Deserializer, Serialize};

use crate::collection::Dimension;

/// One entry of an upstream `actions`-style list. The `type` is opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionValue {
    #[serde(rename = "type", alias = "action_type")]
    pub kind: String,
    #[serde(default, deserialize_with = "de_action_value")]
    pub value: f64,
}

/// Metric block shared by every breakdown record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    #[serde(default, deserialize_with = "de_metric")]
    pub spend: Option<f64>,
    #[serde(default, deserialize_with = "de_metric")]
    pub impressions: Option<f64>,
    #[serde(default, deserialize_with = "de_metric")]
    pub clicks: Option<f64>,
    #[serde(default, deserialize_with = "de_metric")]
    pub reach: Option<f64>,
    #[serde(default, deserialize_with = "de_metric")]
    pub frequency: Option<f64>,
    #[serde(default, deserialize_with = "de_metric")]
    pub ctr: Option<f64>,
    #[serde(default, deserialize_with = "de_metric")]
    pub cpc: Option<f64>,
    #[serde(default, deserialize_with = "de_metric")]
    pub cpm: Option<f64>,
    #[serde(default, deserialize_with = "de_actions")]
    pub actions: Vec<ActionValue>,
    #[serde(default, deserialize_with = "de_actions")]
    pub action_values: Vec<ActionValue>,
    #[serde(default, deserialize_with = "de_actions")]
    pub conversions: Vec<ActionValue>,
}

impl Metrics {
    #[must_use]
    pub fn spend(&self) -> f64 {
        self.spend.unwrap_or(0.0)
    }

    #[must_use]
    pub fn impressions(&self) -> f64 {
        self.impressions.unwrap_or(0.0)
    }

    #[must_use]
    pub fn clicks(&self) -> f64 {
        self.clicks.unwrap_or(0.0)
    }

    #[must_use]
    pub fn reach(&self) -> f64 {
        self.reach.unwrap_or(0.0)
    }

    /// Sum of every `actions` entry, regardless of action type.
    #[must_use]
    pub fn actions_total(&self) -> f64 {
        self.actions.iter().map(|a| a.value).sum()
    }

    /// Scalar metric slots paired with their field names, for in-place fixes.
    pub fn scalars_mut(&mut self) -> [(&'static str, &mut Option<f64>); 8] {
        [
            ("spend", &mut self.spend),
            ("impressions", &mut self.impressions),
            ("clicks", &mut self.clicks),
            ("reach", &mut self.reach),
            ("frequency", &mut self.frequency),
            ("ctr", &mut self.ctr),
            ("cpc", &mut self.cpc),
            ("cpm", &mut self.cpm),
        ]
    }

    /// Nested action lists paired with their field names.
    pub fn action_lists_mut(&mut self) -> [(&'static str, &mut Vec<ActionValue>); 3] {
        [
            ("actions", &mut self.actions),
            ("action_values", &mut self.action_values),
            ("conversions", &mut self.conversions),
        ]
    }
}

/// Common behaviour for every per-breakdown record type.
pub trait DimensionRecord {
    const DIMENSION: Dimension;

    /// The natural key that must be unique within one collection run.
    fn natural_key(&self) -> String;

    fn metrics(&self) -> &Metrics;

    fn metrics_mut(&mut self) -> &mut Metrics;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignRecord {
    #[serde(deserialize_with = "de_key")]
    pub campaign_id: String,
    pub campaign_name: Option<String>,
    pub objective: Option<String>,
    pub buying_type: Option<String>,
    pub optimization_goal: Option<String>,
    pub date_start: Option<String>,
    pub date_stop: Option<String>,
    #[serde(flatten)]
    pub metrics: Metrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemographicRecord {
    #[serde(deserialize_with = "de_key")]
    pub age: String,
    #[serde(deserialize_with = "de_key")]
    pub gender: String,
    #[serde(flatten)]
    pub metrics: Metrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionalRecord {
    #[serde(deserialize_with = "de_key")]
    pub region: String,
    #[serde(flatten)]
    pub metrics: Metrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    #[serde(deserialize_with = "de_key")]
    pub device_platform: String,
    #[serde(flatten)]
    pub metrics: Metrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformRecord {
    #[serde(deserialize_with = "de_key")]
    pub publisher_platform: String,
    #[serde(deserialize_with = "de_key")]
    pub platform_position: String,
    #[serde(flatten)]
    pub metrics: Metrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdRecord {
    #[serde(deserialize_with = "de_key")]
    pub ad_id: String,
    pub ad_name: Option<String>,
    pub campaign_id: Option<String>,
    pub adset_id: Option<String>,
    #[serde(flatten)]
    pub metrics: Metrics,
}

/// Join key parts with `|`, escaping backslashes and `|` inside each part so
/// distinct part lists never produce the same key.
fn compound_key(parts: &[&str]) -> String {
    let mut key = String::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            key.push('|');
        }
        for c in part.chars() {
            if c == '|' || c == '\\' {
                key.push('\\');
            }
            key.push(c);
        }
    }
    key
}

macro_rules! dimension_record {
    ($ty:ty, $dim:expr, |$r:ident| $key:expr) => {
        impl DimensionRecord for $ty {
            const DIMENSION: Dimension = $dim;

            fn natural_key(&self) -> String {
                let $r = self;
                $key
            }

            fn metrics(&self) -> &Metrics {
                &self.metrics
            }

            fn metrics_mut(&mut self) -> &mut Metrics {
                &mut self.metrics
            }
        }
    };
}

dimension_record!(CampaignRecord, Dimension::Campaigns, |r| r.campaign_id.clone());
dimension_record!(DemographicRecord, Dimension::Demographics, |r| compound_key(&[
    r.age.as_str(),
    r.gender.as_str()
]));
dimension_record!(RegionalRecord, Dimension::Regional, |r| r.region.clone());
dimension_record!(DeviceRecord, Dimension::Devices, |r| r.device_platform.clone());
dimension_record!(PlatformRecord, Dimension::Platforms, |r| compound_key(&[
    r.publisher_platform.as_str(),
    r.platform_position.as_str()
]));
dimension_record!(AdRecord, Dimension::AdLevel, |r| r.ad_id.clone());

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

/// Numeric string, number, or null. Unparseable text becomes `NaN` so the
/// cleaner can zero it and record the fix.
fn de_metric<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<NumberOrText>::deserialize(deserializer)? {
        None => None,
        Some(NumberOrText::Number(n)) => Some(n),
        Some(NumberOrText::Text(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.parse::<f64>().unwrap_or(f64::NAN))
            }
        }
    })
}

fn de_action_value<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    de_metric(deserializer).map(|v| v.unwrap_or(0.0))
}

fn de_actions<'de, D>(deserializer: D) -> Result<Vec<ActionValue>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<ActionValue>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum KeyRepr {
    Text(String),
    Signed(i64),
    Unsigned(u64),
}

/// Natural-key fields: required, string or integer.
fn de_key<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match KeyRepr::deserialize(deserializer)? {
        KeyRepr::Text(s) => s,
        KeyRepr::Signed(n) => n.to_string(),
        KeyRepr::Unsigned(n) => n.to_string(),
    })
}
