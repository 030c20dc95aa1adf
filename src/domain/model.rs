use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;

use crate::utils::error::{ReportError, Result};

/// One raw row from the billing store, keyed by column name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Record {
    pub data: HashMap<String, serde_json::Value>,
}

impl Record {
    pub fn get(&self, column: &str) -> Option<&serde_json::Value> {
        self.data.get(column)
    }
}

/// Full result set of the report query, columns in result order.
#[derive(Debug, Clone, Default)]
pub struct FetchedRows {
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

impl FetchedRows {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A record reduced to the three columns the report uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChargeRecord {
    pub date: NaiveDate,
    pub fee_code: Decimal,
    pub amount: Decimal,
}

/// Amount per calendar date, iterated chronologically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailySeries(BTreeMap<NaiveDate, Decimal>);

impl DailySeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, date: NaiveDate, amount: Decimal) {
        *self.0.entry(date).or_insert(Decimal::ZERO) += amount;
    }

    pub fn get(&self, date: &NaiveDate) -> Option<Decimal> {
        self.0.get(date).copied()
    }

    pub fn contains(&self, date: &NaiveDate) -> bool {
        self.0.contains_key(date)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn dates(&self) -> impl DoubleEndedIterator<Item = NaiveDate> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (NaiveDate, Decimal)> + '_ {
        self.0.iter().map(|(date, amount)| (*date, *amount))
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.0.keys().next().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.0.keys().next_back().copied()
    }

    pub fn max_value(&self) -> Option<Decimal> {
        self.0.values().copied().max()
    }
}

impl FromIterator<(NaiveDate, Decimal)> for DailySeries {
    fn from_iter<I: IntoIterator<Item = (NaiveDate, Decimal)>>(iter: I) -> Self {
        let mut series = DailySeries::new();
        for (date, amount) in iter {
            series.add(date, amount);
        }
        series
    }
}

/// Output of the series builder: the total plus the two fee buckets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportSeries {
    pub total: DailySeries,
    pub bucket_a: DailySeries,
    pub bucket_b: DailySeries,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// Zero counts as down.
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio > 0.0 {
            Direction::Up
        } else {
            Direction::Down
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            Direction::Up => "↑",
            Direction::Down => "↓",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariationResult {
    /// Percentage change, rounded to 2 decimals.
    pub ratio: f64,
    pub direction: Direction,
    pub latest: (NaiveDate, Decimal),
    pub previous: (NaiveDate, Decimal),
}

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(ReportError::InvalidConfigValue {
                field: "date_range".to_string(),
                value: format!("{}..{}", start, end),
                reason: "start must not be after end".to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// `[today - lookback_days, today - 1]`.
    pub fn trailing(today: NaiveDate, lookback_days: u32) -> Result<Self> {
        let start = today - Duration::days(i64::from(lookback_days));
        let end = today - Duration::days(1);
        Self::new(start, end)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportArtifact {
    pub file_name: String,
    pub file_path: PathBuf,
    pub range: DateRange,
    pub ratio: f64,
    pub direction: Direction,
    pub subject: String,
}

/// `20.0`, `0.0`, `12.35`, `-3.5`.
pub fn format_ratio(ratio: f64) -> String {
    if ratio == 0.0 {
        return "0.0".to_string();
    }
    if ratio.fract() == 0.0 {
        format!("{:.1}", ratio)
    } else {
        format!("{}", ratio)
    }
}

pub fn build_subject(ratio: f64, direction: Direction) -> String {
    format!("On Demand {}% {}", format_ratio(ratio), direction.arrow())
}
