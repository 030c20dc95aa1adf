pub mod chart;
pub mod engine;
pub mod series;
pub mod variation;

pub use crate::domain::model::{DailySeries, Record, ReportArtifact, ReportSeries};
pub use crate::domain::ports::{ChargeSource, ReportMailer, Storage};
pub use crate::utils::error::Result;
