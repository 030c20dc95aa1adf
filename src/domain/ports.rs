use crate::domain::model::{DateRange, FetchedRows, ReportArtifact};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// Where `path` ends up once written.
    fn location(&self, path: &str) -> PathBuf;
}

/// The billing store: one read of the report function per call.
#[async_trait]
pub trait ChargeSource: Send + Sync {
    async fn fetch_charges(&self, club_id: i32, range: &DateRange) -> Result<FetchedRows>;
}

#[async_trait]
pub trait ReportMailer: Send + Sync {
    async fn send_report(&self, artifact: &ReportArtifact, chart_png: &[u8]) -> Result<()>;
}
