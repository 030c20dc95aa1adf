use crate::utils::error::{ReportError, Result};
use regex::Regex;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(ReportError::InvalidConfigValue {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(ReportError::InvalidConfigValue {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ReportError::InvalidConfigValue {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(ReportError::InvalidConfigValue {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

pub fn validate_port(field_name: &str, port: u16) -> Result<()> {
    validate_range(field_name, port, 1, u16::MAX)
}

/// Accepts `name` or `schema.name` SQL identifiers, nothing that needs quoting.
pub fn validate_sql_identifier(field_name: &str, value: &str) -> Result<()> {
    let re = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
        .map_err(|e| ReportError::config(format!("identifier pattern: {}", e)))?;

    if !re.is_match(value) {
        return Err(ReportError::InvalidConfigValue {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Expected an identifier like schema.function".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_path() {
        assert!(validate_path("report.reports_dir", "reports").is_ok());
        assert!(validate_path("report.reports_dir", "").is_err());
        assert!(validate_path("report.reports_dir", "bad\0path").is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("report.lookback_days", 30, 2, 366).is_ok());
        assert!(validate_range("report.lookback_days", 1, 2, 366).is_err());
        assert!(validate_port("smtp.port", 0).is_err());
        assert!(validate_port("smtp.port", 465).is_ok());
    }

    #[test]
    fn test_validate_sql_identifier() {
        assert!(validate_sql_identifier("database.query_function", "cobros_new.rpt_detallecobros").is_ok());
        assert!(validate_sql_identifier("database.query_function", "rpt_detallecobros").is_ok());
        assert!(validate_sql_identifier("database.query_function", "a.b.c").is_err());
        assert!(validate_sql_identifier("database.query_function", "x; DROP TABLE y").is_err());
        assert!(validate_sql_identifier("database.query_function", "").is_err());
    }
}
