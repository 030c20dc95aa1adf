use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

use crate::config::{ColumnMap, ReportSettings};
use crate::domain::model::{ChargeRecord, Record, ReportSeries};
use crate::utils::error::{ReportError, Result};

/// Shapes raw report rows into the daily total and the two fee-bucket series.
#[derive(Debug, Clone)]
pub struct SeriesBuilder {
    columns: ColumnMap,
    bucket_a: Decimal,
    bucket_b: Decimal,
}

impl SeriesBuilder {
    pub fn new(columns: ColumnMap, bucket_a: Decimal, bucket_b: Decimal) -> Self {
        Self {
            columns,
            bucket_a,
            bucket_b,
        }
    }

    pub fn from_settings(settings: &ReportSettings) -> Self {
        Self::new(
            settings.columns.clone(),
            settings.bucket_a.code,
            settings.bucket_b.code,
        )
    }

    pub fn build(&self, records: &[Record]) -> Result<ReportSeries> {
        if records.is_empty() {
            return Err(ReportError::EmptyResult);
        }

        let charges = records
            .iter()
            .enumerate()
            .map(|(row, record)| self.normalize(row, record))
            .collect::<Result<Vec<_>>>()?;

        let series = self.aggregate(&charges);
        tracing::debug!(
            "Built series: {} days total, {} in bucket A, {} in bucket B",
            series.total.len(),
            series.bucket_a.len(),
            series.bucket_b.len()
        );
        Ok(series)
    }

    /// Sums amounts per date. Dates without a matching fee code are absent from
    /// that bucket, never zero-filled.
    pub fn aggregate(&self, charges: &[ChargeRecord]) -> ReportSeries {
        let mut series = ReportSeries::default();

        for charge in charges {
            series.total.add(charge.date, charge.amount);
            if charge.fee_code == self.bucket_a {
                series.bucket_a.add(charge.date, charge.amount);
            }
            if charge.fee_code == self.bucket_b {
                series.bucket_b.add(charge.date, charge.amount);
            }
        }

        series
    }

    pub fn normalize(&self, row: usize, record: &Record) -> Result<ChargeRecord> {
        let date = self.required(row, record, &self.columns.date, parse_date)?;
        let fee_code = self.required(row, record, &self.columns.fee_code, parse_decimal)?;
        let amount = self.required(row, record, &self.columns.amount, parse_decimal)?;

        Ok(ChargeRecord {
            date,
            fee_code,
            amount,
        })
    }

    fn required<T>(
        &self,
        row: usize,
        record: &Record,
        column: &str,
        parse: fn(&Value) -> std::result::Result<T, String>,
    ) -> Result<T> {
        let malformed = |reason: String| ReportError::MalformedRecord {
            row,
            column: column.to_string(),
            reason,
        };

        match record.get(column) {
            None => Err(malformed("column missing".to_string())),
            Some(Value::Null) => Err(malformed("value is null".to_string())),
            Some(value) => parse(value).map_err(malformed),
        }
    }
}

fn parse_date(value: &Value) -> std::result::Result<NaiveDate, String> {
    let text = match value {
        Value::String(s) => s.trim(),
        other => return Err(format!("expected a date string, got {}", other)),
    };

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Ok(date);
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(datetime.date());
        }
    }
    DateTime::parse_from_rfc3339(text)
        .map(|datetime| datetime.date_naive())
        .map_err(|_| format!("unrecognised date '{}'", text))
}

fn parse_decimal(value: &Value) -> std::result::Result<Decimal, String> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        other => return Err(format!("expected a number, got {}", other)),
    };

    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| format!("unrecognised number '{}'", text))
}
