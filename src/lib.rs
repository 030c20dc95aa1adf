pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliArgs;

pub use adapters::{LocalStorage, PgChargeSource, SmtpMailer};
pub use app::ReportJob;
pub use config::ReportConfig;
pub use crate::core::{chart::ChartRenderer, engine::ReportEngine, series::SeriesBuilder};
pub use utils::error::{ReportError, Result};
