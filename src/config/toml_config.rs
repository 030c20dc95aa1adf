use crate::utils::error::{ReportError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub database: DatabaseConfig,
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub report: ReportSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    #[serde(default = "default_query_function")]
    pub query_function: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    /// Sender address, also the login user.
    pub address: String,
    pub password: String,
    /// Addresses separated by `,` or `;`.
    pub recipients: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    pub club_id: i32,
    pub reports_dir: PathBuf,
    pub lookback_days: u32,
    pub columns: ColumnMap,
    pub bucket_a: FeeBucket,
    pub bucket_b: FeeBucket,
}

/// Names of the columns the report function returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    pub date: String,
    pub fee_code: String,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBucket {
    pub code: Decimal,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
    pub retention_days: usize,
}

fn default_query_function() -> String {
    "cobros_new.rpt_detallecobros".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            club_id: 166,
            reports_dir: PathBuf::from("reports"),
            lookback_days: 30,
            columns: ColumnMap::default(),
            bucket_a: FeeBucket {
                code: Decimal::new(431, 2),
                label: "Monto 5".to_string(),
            },
            bucket_b: FeeBucket {
                code: Decimal::new(862, 2),
                label: "Monto 10".to_string(),
            },
        }
    }
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            date: "dte_fecha".to_string(),
            fee_code: "n_fee".to_string(),
            amount: "i_total".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            retention_days: 7,
        }
    }
}

impl ReportConfig {
    /// Loads the file and resolves relative directories against the file's own directory.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ReportError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_toml_str(&content)?;

        if let Some(base) = path.parent() {
            config.resolve_relative_paths(base);
        }
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content)
            .map_err(|e| ReportError::config(format!("TOML parsing error: {}", e)))
    }

    /// Replaces `${VAR}` with the environment value; an unset variable is an error.
    /// Comment lines are left as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| ReportError::config(format!("placeholder pattern: {}", e)))?;

        let mut missing: Option<String> = None;
        let lines: Vec<String> = content
            .lines()
            .map(|line| {
                if line.trim_start().starts_with('#') {
                    return line.to_string();
                }
                re.replace_all(line, |caps: &regex::Captures| {
                    let var_name = &caps[1];
                    std::env::var(var_name).unwrap_or_else(|_| {
                        missing.get_or_insert_with(|| var_name.to_string());
                        String::new()
                    })
                })
                .into_owned()
            })
            .collect();

        if let Some(var_name) = missing {
            return Err(ReportError::MissingConfig {
                field: format!("environment variable {}", var_name),
            });
        }
        Ok(lines.join("\n"))
    }

    fn resolve_relative_paths(&mut self, base: &Path) {
        if self.report.reports_dir.is_relative() {
            self.report.reports_dir = base.join(&self.report.reports_dir);
        }
        if self.logging.dir.is_relative() {
            self.logging.dir = base.join(&self.logging.dir);
        }
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("database.host", &self.database.host)?;
        validation::validate_port("database.port", self.database.port)?;
        validation::validate_non_empty_string("database.database", &self.database.database)?;
        validation::validate_non_empty_string("database.user", &self.database.user)?;
        validation::validate_sql_identifier(
            "database.query_function",
            &self.database.query_function,
        )?;
        validation::validate_range("database.timeout_seconds", self.database.timeout_seconds, 1, 3600)?;

        validation::validate_non_empty_string("smtp.server", &self.smtp.server)?;
        validation::validate_port("smtp.port", self.smtp.port)?;
        validation::validate_non_empty_string("smtp.address", &self.smtp.address)?;
        validation::validate_range("smtp.timeout_seconds", self.smtp.timeout_seconds, 1, 3600)?;
        if self.recipient_list().is_empty() {
            return Err(ReportError::MissingConfig {
                field: "smtp.recipients".to_string(),
            });
        }

        validation::validate_range("report.club_id", self.report.club_id, 0, i32::MAX)?;
        validation::validate_range("report.lookback_days", self.report.lookback_days, 2, 366)?;
        validation::validate_path(
            "report.reports_dir",
            &self.report.reports_dir.to_string_lossy(),
        )?;
        validation::validate_non_empty_string("report.columns.date", &self.report.columns.date)?;
        validation::validate_non_empty_string(
            "report.columns.fee_code",
            &self.report.columns.fee_code,
        )?;
        validation::validate_non_empty_string("report.columns.amount", &self.report.columns.amount)?;
        if self.report.bucket_a.code == self.report.bucket_b.code {
            return Err(ReportError::InvalidConfigValue {
                field: "report.bucket_b.code".to_string(),
                value: self.report.bucket_b.code.to_string(),
                reason: "Fee buckets must use different codes".to_string(),
            });
        }

        validation::validate_path("logging.dir", &self.logging.dir.to_string_lossy())?;
        validation::validate_range("logging.retention_days", self.logging.retention_days, 1, 365)?;

        Ok(())
    }

    pub fn recipient_list(&self) -> Vec<String> {
        self.smtp
            .recipients
            .split([',', ';'])
            .map(str::trim)
            .filter(|address| !address.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl Validate for ReportConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
