// src/types.rs

use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize, Serializer};
use std::{fmt, str::FromStr};

use crate::error::DashboardError;

/// A calendar month; every date in the pipeline collapses to one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        // reject anything chrono can't place on a calendar
        NaiveDate::from_ymd_opt(year, month, 1)?;
        Some(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Number of calendar days, 29 for a leap February.
    pub fn days(&self) -> u32 {
        let next = self.add_months(1).first_day();
        next.signed_duration_since(self.first_day()).num_days() as u32
    }

    pub fn add_months(&self, delta: i32) -> Self {
        let zero_based = self.year * 12 + (self.month as i32 - 1) + delta;
        Self {
            year: zero_based.div_euclid(12),
            month: zero_based.rem_euclid(12) as u32 + 1,
        }
    }

    /// Abbreviated month-year, e.g. "Jan 2024".
    pub fn label(&self) -> String {
        self.first_day().format("%b %Y").to_string()
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for Month {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Whether a value is a monthly total or a point-in-time quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowType {
    Flow,
    Level,
}

impl FlowType {
    /// Lower-cases the raw cell; blank means flow, anything but "flow" passes
    /// through unnormalised as a level.
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_lowercase()) {
            None => FlowType::Flow,
            Some(s) if s.is_empty() || s == "flow" => FlowType::Flow,
            Some(_) => FlowType::Level,
        }
    }
}

/// Display units offered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    #[default]
    Metric,
    Barrels,
}

impl Unit {
    pub fn label(&self) -> &'static str {
        match self {
            Unit::Metric => "m³/day",
            Unit::Barrels => "bbl/day",
        }
    }

    /// Multiplier applied to normalised values for this unit.
    pub fn factor(&self, barrel_conversion: f64) -> f64 {
        match self {
            Unit::Metric => 1.0,
            Unit::Barrels => barrel_conversion,
        }
    }
}

impl FromStr for Unit {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "metric" | "m3" | "m³/day" | "m3/day" => Ok(Unit::Metric),
            "barrels" | "bbl" | "bbl/day" => Ok(Unit::Barrels),
            other => Err(anyhow::anyhow!("unknown unit `{}`", other)),
        }
    }
}

/// One row of the primary dataset after coercion.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// `None` when the raw date did not parse
    pub date: Option<Month>,
    pub label: String,
    /// `None` when the raw value did not parse
    pub value: Option<f64>,
    pub kind: FlowType,
}

/// One row of the secondary (operator/scheme) dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorSchemeObservation {
    pub date: Option<Month>,
    pub operator: String,
    pub scheme: String,
    pub bitumen_volume: Option<f64>,
}

impl OperatorSchemeObservation {
    /// Drill-down row key; `None` if either half is blank.
    pub fn label(&self) -> Option<String> {
        let operator = self.operator.trim();
        let scheme = self.scheme.trim();
        if operator.is_empty() || scheme.is_empty() {
            return None;
        }
        Some(format!("{} – {}", operator, scheme))
    }

    pub fn to_observation(&self, kind: FlowType) -> Option<Observation> {
        Some(Observation {
            date: self.date,
            label: self.label()?,
            value: self.bitumen_volume,
            kind,
        })
    }
}

/// Closed interval of months, both bounds included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: Month,
    pub end: Month,
}

impl DateRange {
    pub fn new(start: Month, end: Month) -> Result<Self> {
        if start > end {
            return Err(DashboardError::InvalidDateRange { start, end }.into());
        }
        Ok(Self { start, end })
    }

    /// The `months` months ending at `max`, inclusive.
    pub fn trailing(max: Month, months: u32) -> Self {
        let span = months.max(1) as i32 - 1;
        Self {
            start: max.add_months(-span),
            end: max,
        }
    }

    /// Pull both bounds inside `bounds`.
    pub fn clamp(&self, bounds: &DateRange) -> Self {
        let start = self.start.clamp(bounds.start, bounds.end);
        let end = self.end.clamp(bounds.start, bounds.end);
        Self {
            start: start.min(end),
            end,
        }
    }

    pub fn contains(&self, month: Month) -> bool {
        self.start <= month && month <= self.end
    }

    /// Smallest range covering every month in `months`.
    pub fn covering<I: IntoIterator<Item = Month>>(months: I) -> Option<Self> {
        let mut it = months.into_iter();
        let first = it.next()?;
        let (start, end) = it.fold((first, first), |(lo, hi), m| (lo.min(m), hi.max(m)));
        Some(Self { start, end })
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start.label(), self.end.label())
    }
}
