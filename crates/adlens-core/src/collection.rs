//! The envelope produced by a single data pull.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::records::{
    AdRecord, CampaignRecord, DemographicRecord, DeviceRecord, PlatformRecord, RegionalRecord,
};
use crate::CoreError;

/// A breakdown endpoint of the ads platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Campaigns,
    Demographics,
    Regional,
    Devices,
    Platforms,
    AdLevel,
}

impl Dimension {
    pub const ALL: [Dimension; 6] = [
        Dimension::Campaigns,
        Dimension::Demographics,
        Dimension::Regional,
        Dimension::Devices,
        Dimension::Platforms,
        Dimension::AdLevel,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::Campaigns => "campaigns",
            Dimension::Demographics => "demographics",
            Dimension::Regional => "regional",
            Dimension::Devices => "devices",
            Dimension::Platforms => "platforms",
            Dimension::AdLevel => "ad_level",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dimension::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| format!("unknown dimension '{s}'"))
    }
}

/// Inclusive reporting window sent to the insights API as `time_range`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub since: NaiveDate,
    pub until: NaiveDate,
}

impl DateRange {
    /// # Errors
    ///
    /// Returns [`CoreError::InvertedDateRange`] when `since > until`.
    pub fn new(since: NaiveDate, until: NaiveDate) -> Result<Self, CoreError> {
        if since > until {
            return Err(CoreError::InvertedDateRange {
                since: since.to_string(),
                until: until.to_string(),
            });
        }
        Ok(Self { since, until })
    }

    /// The full calendar month named by `month_year`, capped at `today` so the
    /// current month is never requested past the present day.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidMonth`] for a malformed identifier and
    /// [`CoreError::InvertedDateRange`] for a month that starts after `today`.
    pub fn for_month(month_year: &str, today: NaiveDate) -> Result<Self, CoreError> {
        let (year, month) = parse_month(month_year)?;
        let since = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| CoreError::InvalidMonth(month_year.to_string()))?;
        let next_month = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(|| CoreError::InvalidMonth(month_year.to_string()))?;
        let last_day = next_month.pred_opt().unwrap_or(since);
        Self::new(since, last_day.min(today))
    }

    /// Number of calendar days covered, inclusive of both ends.
    #[must_use]
    pub fn days(&self) -> i64 {
        (self.until - self.since).num_days() + 1
    }
}

/// Parse a `YYYY-MM` month identifier into `(year, month)`.
///
/// # Errors
///
/// Returns [`CoreError::InvalidMonth`] unless the input is exactly four digits,
/// a dash, and a month between `01` and `12`.
pub fn parse_month(month_year: &str) -> Result<(i32, u32), CoreError> {
    let invalid = || CoreError::InvalidMonth(month_year.to_string());
    let (y, m) = month_year.split_once('-').ok_or_else(invalid)?;
    if y.len() != 4 || m.len() != 2 || !y.chars().chain(m.chars()).all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let year = y.parse::<i32>().map_err(|_| invalid())?;
    let month = m.parse::<u32>().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }
    Ok((year, month))
}

/// `YYYY-MM` for the month containing `now`.
#[must_use]
pub fn current_month(now: DateTime<Utc>) -> String {
    format!("{:04}-{:02}", now.year(), now.month())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub total_records: usize,
    pub successful_endpoints: usize,
    #[serde(default)]
    pub failed_endpoints: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Untyped per-dimension record arrays, as fetched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDimensions {
    #[serde(default)]
    pub campaigns: Vec<Value>,
    #[serde(default)]
    pub demographics: Vec<Value>,
    #[serde(default)]
    pub regional: Vec<Value>,
    #[serde(default)]
    pub devices: Vec<Value>,
    #[serde(default)]
    pub platforms: Vec<Value>,
    #[serde(default)]
    pub ad_level: Vec<Value>,
}

impl RawDimensions {
    #[must_use]
    pub fn get(&self, dimension: Dimension) -> &[Value] {
        match dimension {
            Dimension::Campaigns => &self.campaigns,
            Dimension::Demographics => &self.demographics,
            Dimension::Regional => &self.regional,
            Dimension::Devices => &self.devices,
            Dimension::Platforms => &self.platforms,
            Dimension::AdLevel => &self.ad_level,
        }
    }

    pub fn set(&mut self, dimension: Dimension, records: Vec<Value>) {
        let slot = match dimension {
            Dimension::Campaigns => &mut self.campaigns,
            Dimension::Demographics => &mut self.demographics,
            Dimension::Regional => &mut self.regional,
            Dimension::Devices => &mut self.devices,
            Dimension::Platforms => &mut self.platforms,
            Dimension::AdLevel => &mut self.ad_level,
        };
        *slot = records;
    }

    #[must_use]
    pub fn total_records(&self) -> usize {
        Dimension::ALL.iter().map(|d| self.get(*d).len()).sum()
    }
}

/// A data pull before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCollection {
    pub account_id: String,
    pub scraped_at: DateTime<Utc>,
    pub date_range: DateRange,
    pub month_year: String,
    pub data: RawDimensions,
    #[serde(default)]
    pub summary: CollectionSummary,
}

/// A validated data pull. Treated as immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionResult {
    pub account_id: String,
    pub scraped_at: DateTime<Utc>,
    pub date_range: DateRange,
    pub month_year: String,
    #[serde(default)]
    pub campaigns: Vec<CampaignRecord>,
    #[serde(default)]
    pub demographics: Vec<DemographicRecord>,
    #[serde(default)]
    pub regional: Vec<RegionalRecord>,
    #[serde(default)]
    pub devices: Vec<DeviceRecord>,
    #[serde(default)]
    pub platforms: Vec<PlatformRecord>,
    #[serde(default)]
    pub ad_level: Vec<AdRecord>,
    pub summary: CollectionSummary,
}

impl CollectionResult {
    #[must_use]
    pub fn record_count(&self, dimension: Dimension) -> usize {
        match dimension {
            Dimension::Campaigns => self.campaigns.len(),
            Dimension::Demographics => self.demographics.len(),
            Dimension::Regional => self.regional.len(),
            Dimension::Devices => self.devices.len(),
            Dimension::Platforms => self.platforms.len(),
            Dimension::AdLevel => self.ad_level.len(),
        }
    }

    #[must_use]
    pub fn total_records(&self) -> usize {
        Dimension::ALL.iter().map(|d| self.record_count(*d)).sum()
    }
}
