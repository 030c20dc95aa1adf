use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing configuration value: {field}")]
    MissingConfig { field: String },

    #[error("Invalid configuration value for {field} ({value}): {reason}")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Data source error: {message}")]
    DataSource { message: String },

    #[error("{stage} timed out after {seconds}s")]
    Timeout { stage: String, seconds: u64 },

    #[error("The billing store returned no charge records")]
    EmptyResult,

    #[error("Malformed record at row {row}, column '{column}': {reason}")]
    MalformedRecord {
        row: usize,
        column: String,
        reason: String,
    },

    #[error("Need at least 2 days of data to compute the variation, found {found}")]
    InsufficientData { found: usize },

    #[error("Previous day ({date}) total is zero, variation is undefined")]
    ZeroBaseline { date: NaiveDate },

    #[error("Variation could not be computed: {message}")]
    Variation { message: String },

    #[error("Chart rendering failed: {message}")]
    Render { message: String },

    #[error("Mail delivery failed: {message}")]
    Delivery { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Transient, a manual rerun may succeed.
    Medium,
    /// The data or the report itself is unusable.
    High,
    /// The process cannot start.
    Critical,
}

impl ReportError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn data_source(message: impl Into<String>) -> Self {
        Self::DataSource {
            message: message.into(),
        }
    }

    pub fn render(message: impl std::fmt::Display) -> Self {
        Self::Render {
            message: message.to_string(),
        }
    }

    pub fn delivery(message: impl Into<String>) -> Self {
        Self::Delivery {
            message: message.into(),
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Config { .. } | Self::MissingConfig { .. } | Self::InvalidConfigValue { .. } => {
                ErrorSeverity::Critical
            }
            Self::Database(_) | Self::DataSource { .. } | Self::Timeout { .. } => {
                ErrorSeverity::Medium
            }
            Self::Delivery { .. } => ErrorSeverity::Medium,
            Self::EmptyResult
            | Self::MalformedRecord { .. }
            | Self::InsufficientData { .. }
            | Self::ZeroBaseline { .. }
            | Self::Variation { .. }
            | Self::Render { .. }
            | Self::Io(_) => ErrorSeverity::High,
        }
    }

    /// Whether rerunning the job unchanged has a chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        self.severity() == ErrorSeverity::Medium
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::Config { .. } | Self::MissingConfig { .. } | Self::InvalidConfigValue { .. } => {
                "Check the configuration file and the environment variables it references"
            }
            Self::Database(_) | Self::DataSource { .. } => {
                "Verify the database is reachable and the credentials are valid, then rerun"
            }
            Self::Timeout { .. } => "The remote side was slow to answer; rerun the job later",
            Self::EmptyResult | Self::InsufficientData { .. } => {
                "The billing store returned too little data for the requested range"
            }
            Self::MalformedRecord { .. } => {
                "Check the column mapping in [report.columns] against the report function"
            }
            Self::ZeroBaseline { .. } | Self::Variation { .. } => {
                "The previous day has no charges; inspect the billing data before resending"
            }
            Self::Render { .. } | Self::Io(_) => {
                "Check that the reports directory is writable and has free space"
            }
            Self::Delivery { .. } => {
                "Check the SMTP settings and recipients; the chart is kept in the reports directory"
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
