use crate::core::chart::ChartRenderer;
use crate::core::series::SeriesBuilder;
use crate::core::variation::compute_variation;
use crate::domain::model::{build_subject, DateRange, ReportArtifact};
use crate::domain::ports::{ChargeSource, Storage};
use crate::utils::error::{ReportError, Result};

/// Runs fetch, shape, ratio and render strictly in order. The first failing
/// stage ends the run; no partial artifact is returned.
pub struct ReportEngine<S: ChargeSource, T: Storage> {
    source: S,
    storage: T,
    builder: SeriesBuilder,
    renderer: ChartRenderer,
}

impl<S: ChargeSource, T: Storage> ReportEngine<S, T> {
    pub fn new(source: S, storage: T, builder: SeriesBuilder, renderer: ChartRenderer) -> Self {
        Self {
            source,
            storage,
            builder,
            renderer,
        }
    }

    pub fn storage(&self) -> &T {
        &self.storage
    }

    pub async fn generate_report(&self, range: &DateRange, club_id: i32) -> Result<ReportArtifact> {
        tracing::info!("Generating report for club {}: {}", club_id, range);

        // Fetch
        let rows = self
            .source
            .fetch_charges(club_id, range)
            .await
            .inspect_err(|e| tracing::error!("Fetching charges failed: {}", e))?;
        tracing::debug!("Fetched {} rows with columns {:?}", rows.len(), rows.columns);

        // Shape
        let series = self
            .builder
            .build(&rows.records)
            .inspect_err(|e| tracing::error!("Building the daily series failed: {}", e))?;
        tracing::info!("Aggregated {} days of charges", series.total.len());

        // Ratio
        let variation = compute_variation(&series.total).inspect_err(|e| {
            tracing::error!("Could not compute the day-over-day variation: {}", e)
        })?;
        tracing::info!(
            "Variation {}% ({}): {} on {} vs {} on {}",
            variation.ratio,
            variation.direction,
            variation.latest.1,
            variation.latest.0,
            variation.previous.1,
            variation.previous.0
        );

        // Render
        let png = self
            .renderer
            .render(&series)
            .inspect_err(|e| tracing::error!("Error generating the chart: {}", e))?;
        let file_name = ChartRenderer::file_name(range);
        self.storage
            .write_file(&file_name, &png)
            .await
            .map_err(|e| ReportError::render(format!("cannot write {}: {}", file_name, e)))
            .inspect_err(|e| tracing::error!("Error saving the chart: {}", e))?;

        let file_path = self.storage.location(&file_name);
        tracing::info!("Chart written to {}", file_path.display());

        Ok(ReportArtifact {
            subject: build_subject(variation.ratio, variation.direction),
            file_name,
            file_path,
            range: *range,
            ratio: variation.ratio,
            direction: variation.direction,
        })
    }
}
