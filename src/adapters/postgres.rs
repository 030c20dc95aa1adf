use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::{Column, Connection, Row, TypeInfo};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

use crate::config::DatabaseConfig;
use crate::domain::model::{DateRange, FetchedRows, Record};
use crate::domain::ports::ChargeSource;
use crate::utils::error::{ReportError, Result};

pub fn report_query(function: &str) -> String {
    format!("SELECT * FROM {}($1, $2, $3)", function)
}

/// Reads the billing report function over a single, unpooled connection.
pub struct PgChargeSource {
    options: PgConnectOptions,
    host: String,
    query: String,
    timeout_seconds: u64,
}

impl PgChargeSource {
    /// `config.query_function` is interpolated into the SQL text, so it must
    /// already have passed `ReportConfig::validate`.
    pub fn new(config: &DatabaseConfig) -> Self {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database);

        Self {
            options,
            host: format!("{}:{}/{}", config.host, config.port, config.database),
            query: report_query(&config.query_function),
            timeout_seconds: config.timeout_seconds,
        }
    }

    fn limit(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    async fn connect(&self) -> Result<PgConnection> {
        match timeout(self.limit(), PgConnection::connect_with(&self.options)).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => {
                tracing::error!("Could not connect to {}: {}", self.host, e);
                Err(ReportError::data_source(format!(
                    "cannot connect to {}: {}",
                    self.host, e
                )))
            }
            Err(_) => {
                tracing::error!("Connecting to {} timed out", self.host);
                Err(ReportError::Timeout {
                    stage: "database connect".to_string(),
                    seconds: self.timeout_seconds,
                })
            }
        }
    }

    async fn run_query(
        &self,
        conn: &mut PgConnection,
        club_id: i32,
        range: &DateRange,
    ) -> Result<FetchedRows> {
        let rows = timeout(
            self.limit(),
            sqlx::query(&self.query)
                .bind(club_id)
                .bind(range.start)
                .bind(range.end)
                .fetch_all(&mut *conn),
        )
        .await
        .map_err(|_| ReportError::Timeout {
            stage: "report query".to_string(),
            seconds: self.timeout_seconds,
        })??;

        let columns = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();
        let records = rows.iter().map(row_to_record).collect();

        Ok(FetchedRows { columns, records })
    }
}

#[async_trait]
impl ChargeSource for PgChargeSource {
    async fn fetch_charges(&self, club_id: i32, range: &DateRange) -> Result<FetchedRows> {
        let mut conn = self.connect().await?;
        let fetched = self.run_query(&mut conn, club_id, range).await;

        // Close before reporting the outcome, whatever it was.
        close_within(self.limit(), conn.close()).await;

        match &fetched {
            Ok(rows) => tracing::info!(
                "Query executed successfully: {} rows for club {} ({})",
                rows.len(),
                club_id,
                range
            ),
            Err(e) => tracing::error!("Error executing the report query: {}", e),
        }
        fetched
    }
}

/// Waits at most `limit` for the close handshake. Returns whether the
/// connection closed cleanly; failures are only logged.
async fn close_within<F>(limit: Duration, close: F) -> bool
where
    F: Future<Output = std::result::Result<(), sqlx::Error>>,
{
    match timeout(limit, close).await {
        Ok(Ok(())) => {
            tracing::info!("Database connection closed");
            true
        }
        Ok(Err(e)) => {
            tracing::warn!("Closing the database connection failed: {}", e);
            false
        }
        Err(_) => {
            tracing::warn!(
                "Closing the database connection timed out after {}s",
                limit.as_secs()
            );
            false
        }
    }
}

fn row_to_record(row: &PgRow) -> Record {
    let data: HashMap<String, Value> = row
        .columns()
        .iter()
        .map(|column| {
            let value = column_value(row, column.ordinal(), column.type_info().name());
            (column.name().to_string(), value)
        })
        .collect();
    Record { data }
}

/// NUMERIC travels as its exact decimal text; dates and timestamps as ISO text.
fn column_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    let decoded: std::result::Result<Option<Value>, sqlx::Error> = match type_name {
        "INT2" => row.try_get::<Option<i16>, _>(index).map(|v| v.map(Value::from)),
        "INT4" => row.try_get::<Option<i32>, _>(index).map(|v| v.map(Value::from)),
        "INT8" => row.try_get::<Option<i64>, _>(index).map(|v| v.map(Value::from)),
        "FLOAT4" => row.try_get::<Option<f32>, _>(index).map(|v| v.map(Value::from)),
        "FLOAT8" => row.try_get::<Option<f64>, _>(index).map(|v| v.map(Value::from)),
        "BOOL" => row.try_get::<Option<bool>, _>(index).map(|v| v.map(Value::from)),
        "NUMERIC" => row
            .try_get::<Option<Decimal>, _>(index)
            .map(|v| v.map(|d| Value::String(d.to_string()))),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHAR" => {
            row.try_get::<Option<String>, _>(index).map(|v| v.map(Value::from))
        }
        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(index)
            .map(|v| v.map(|d| Value::String(d.format("%Y-%m-%d").to_string()))),
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(index)
            .map(|v| v.map(|t| Value::String(t.to_string()))),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(index)
            .map(|v| v.map(|t| Value::String(t.to_rfc3339()))),
        other => {
            tracing::debug!("Column {} has unsupported type {}, passed as null", index, other);
            return Value::Null;
        }
    };

    decoded.map(|v| v.unwrap_or(Value::Null)).unwrap_or_else(|e| {
        tracing::debug!("Column {} ({}) could not be decoded: {}", index, type_name, e);
        Value::Null
    })
}
