use chrono::NaiveDate;

use crate::adapters::{LocalStorage, PgChargeSource, SmtpMailer};
use crate::config::ReportConfig;
use crate::core::chart::ChartRenderer;
use crate::core::engine::ReportEngine;
use crate::core::series::SeriesBuilder;
use crate::domain::model::{format_ratio, DateRange, ReportArtifact};
use crate::domain::ports::{ChargeSource, ReportMailer, Storage};
use crate::utils::error::{ReportError, Result};

/// One scheduled run: report over the trailing window, then email it.
///
/// Generation and delivery fail separately: a chart that was written but not
/// sent is logged as generated before the delivery error is logged.
pub struct ReportJob<S: ChargeSource, T: Storage, M: ReportMailer> {
    engine: ReportEngine<S, T>,
    mailer: Option<M>,
    club_id: i32,
    lookback_days: u32,
}

impl ReportJob<PgChargeSource, LocalStorage, SmtpMailer> {
    /// Wires the production adapters. `deliver = false` skips the mailer entirely.
    pub fn from_config(config: &ReportConfig, deliver: bool) -> Result<Self> {
        let engine = ReportEngine::new(
            PgChargeSource::new(&config.database),
            LocalStorage::new(config.report.reports_dir.clone()),
            SeriesBuilder::from_settings(&config.report),
            ChartRenderer::from_settings(&config.report),
        );
        let mailer = if deliver {
            Some(SmtpMailer::new(&config.smtp, &config.recipient_list())?)
        } else {
            None
        };

        Ok(Self::new(
            engine,
            mailer,
            config.report.club_id,
            config.report.lookback_days,
        ))
    }
}

impl<S: ChargeSource, T: Storage, M: ReportMailer> ReportJob<S, T, M> {
    pub fn new(
        engine: ReportEngine<S, T>,
        mailer: Option<M>,
        club_id: i32,
        lookback_days: u32,
    ) -> Self {
        Self {
            engine,
            mailer,
            club_id,
            lookback_days,
        }
    }

    pub async fn run(&self, today: NaiveDate) -> Result<ReportArtifact> {
        let range = DateRange::trailing(today, self.lookback_days)?;
        tracing::info!("📅 Report range: start = {}, end = {}", range.start, range.end);
        tracing::info!("🚀 Starting report generation and delivery");

        let artifact = match self.engine.generate_report(&range, self.club_id).await {
            Ok(artifact) => artifact,
            Err(e) => {
                tracing::error!("❌ Report generation failed: {}", e);
                return Err(e);
            }
        };
        tracing::info!(
            "✅ Report generated: {} with ratio {}%",
            artifact.file_path.display(),
            format_ratio(artifact.ratio)
        );

        match &self.mailer {
            Some(mailer) => {
                if let Err(e) = self.deliver(mailer, &artifact).await {
                    tracing::error!("❌ Report generated but the email was not sent: {}", e);
                    return Err(e);
                }
            }
            None => tracing::info!("📭 Email delivery disabled, report left in place"),
        }

        tracing::info!("✅ Process completed successfully");
        Ok(artifact)
    }

    async fn deliver(&self, mailer: &M, artifact: &ReportArtifact) -> Result<()> {
        let chart_png = self
            .engine
            .storage()
            .read_file(&artifact.file_name)
            .await
            .map_err(|e| {
                ReportError::delivery(format!(
                    "chart image not found at {}: {}",
                    artifact.file_path.display(),
                    e
                ))
            })?;

        mailer.send_report(artifact, &chart_png).await
    }
}
