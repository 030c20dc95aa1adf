use async_trait::async_trait;
use charges_report::config::ReportSettings;
use charges_report::core::chart::ChartRenderer;
use charges_report::core::engine::ReportEngine;
use charges_report::core::series::SeriesBuilder;
use charges_report::domain::model::{DateRange, Direction, FetchedRows, Record, ReportArtifact};
use charges_report::domain::ports::{ChargeSource, ReportMailer};
use charges_report::{LocalStorage, ReportError, ReportJob, Result};
use chrono::NaiveDate;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Mutex;

struct InMemorySource {
    rows: Vec<(&'static str, &'static str, &'static str)>,
    fail: bool,
    calls: Arc<Mutex<Vec<(i32, DateRange)>>>,
}

impl InMemorySource {
    fn new(rows: Vec<(&'static str, &'static str, &'static str)>) -> Self {
        Self {
            rows,
            fail: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(vec![])
        }
    }
}

#[async_trait]
impl ChargeSource for InMemorySource {
    async fn fetch_charges(&self, club_id: i32, range: &DateRange) -> Result<FetchedRows> {
        self.calls.lock().await.push((club_id, *range));
        if self.fail {
            return Err(ReportError::data_source("connection refused"));
        }

        let records = self
            .rows
            .iter()
            .map(|(date, fee, amount)| {
                let mut record = Record::default();
                record.data.insert("dte_fecha".to_string(), json!(date));
                record.data.insert("n_fee".to_string(), json!(fee));
                record.data.insert("i_total".to_string(), json!(amount));
                record.data.insert("s_club".to_string(), json!("passthrough"));
                record
            })
            .collect();

        Ok(FetchedRows {
            columns: vec![
                "dte_fecha".to_string(),
                "n_fee".to_string(),
                "i_total".to_string(),
                "s_club".to_string(),
            ],
            records,
        })
    }
}

#[derive(Clone, Default)]
struct RecordingMailer {
    sent: Arc<Mutex<Vec<(ReportArtifact, Vec<u8>)>>>,
    fail: bool,
}

#[async_trait]
impl ReportMailer for RecordingMailer {
    async fn send_report(&self, artifact: &ReportArtifact, chart_png: &[u8]) -> Result<()> {
        if self.fail {
            return Err(ReportError::delivery("535 authentication failed"));
        }
        self.sent
            .lock()
            .await
            .push((artifact.clone(), chart_png.to_vec()));
        Ok(())
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()
}

fn engine(source: InMemorySource, reports_dir: &std::path::Path) -> ReportEngine<InMemorySource, LocalStorage> {
    let settings = ReportSettings::default();
    ReportEngine::new(
        source,
        LocalStorage::new(reports_dir),
        SeriesBuilder::from_settings(&settings),
        ChartRenderer::from_settings(&settings).with_size(800, 400),
    )
}

fn flat_rows() -> Vec<(&'static str, &'static str, &'static str)> {
    vec![
        ("2024-01-01", "4.31", "100"),
        ("2024-01-01", "8.62", "50"),
        ("2024-01-02", "4.31", "80"),
        ("2024-01-02", "8.62", "70"),
    ]
}

#[tokio::test]
async fn test_end_to_end_report_is_written_and_mailed() {
    let temp_dir = TempDir::new().unwrap();
    let reports_dir = temp_dir.path().join("reports");
    let source = InMemorySource::new(flat_rows());
    let calls = source.calls.clone();
    let mailer = RecordingMailer::default();

    let job = ReportJob::new(engine(source, &reports_dir), Some(mailer.clone()), 166, 30);
    let artifact = job.run(today()).await.unwrap();

    // Flat totals: zero change counts as down.
    assert_eq!(artifact.ratio, 0.0);
    assert_eq!(artifact.direction, Direction::Down);
    assert_eq!(artifact.subject, "On Demand 0.0% ↓");

    let expected_path = reports_dir.join("report_2024-01-01_2024-01-30.png");
    assert_eq!(artifact.file_path, expected_path);
    let written = std::fs::read(&expected_path).unwrap();
    assert!(!written.is_empty());

    let calls = calls.lock().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, 166);
    assert_eq!(calls[0].1.start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    assert_eq!(calls[0].1.end, NaiveDate::from_ymd_opt(2024, 1, 30).unwrap());

    let sent = mailer.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0.subject, "On Demand 0.0% ↓");
    assert_eq!(sent[0].1, written);
}

#[tokio::test]
async fn test_increase_builds_up_subject() {
    let temp_dir = TempDir::new().unwrap();
    let source = InMemorySource::new(vec![
        ("2024-01-01", "4.31", "100"),
        ("2024-01-02", "4.31", "70"),
        ("2024-01-02", "8.62", "50"),
    ]);

    let job = ReportJob::new(
        engine(source, temp_dir.path()),
        Some(RecordingMailer::default()),
        166,
        30,
    );
    let artifact = job.run(today()).await.unwrap();

    assert_eq!(artifact.ratio, 20.0);
    assert_eq!(artifact.direction, Direction::Up);
    assert_eq!(artifact.subject, "On Demand 20.0% ↑");
}

#[tokio::test]
async fn test_empty_result_aborts_before_rendering() {
    let temp_dir = TempDir::new().unwrap();
    let mailer = RecordingMailer::default();

    let job = ReportJob::new(
        engine(InMemorySource::new(vec![]), temp_dir.path()),
        Some(mailer.clone()),
        166,
        30,
    );
    let err = job.run(today()).await.unwrap_err();

    assert!(matches!(err, ReportError::EmptyResult));
    assert!(!temp_dir.path().join("report_2024-01-01_2024-01-30.png").exists());
    assert!(mailer.sent.lock().await.is_empty());
}

#[tokio::test]
async fn test_single_day_is_insufficient_data() {
    let temp_dir = TempDir::new().unwrap();
    let source = InMemorySource::new(vec![
        ("2024-01-05", "4.31", "10"),
        ("2024-01-05", "8.62", "20"),
    ]);

    let job = ReportJob::new(
        engine(source, temp_dir.path()),
        Some(RecordingMailer::default()),
        166,
        30,
    );

    assert!(matches!(
        job.run(today()).await,
        Err(ReportError::InsufficientData { found: 1 })
    ));
    assert!(!temp_dir.path().join("report_2024-01-01_2024-01-30.png").exists());
}

#[tokio::test]
async fn test_zero_previous_day_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let source = InMemorySource::new(vec![
        ("2024-01-01", "4.31", "0"),
        ("2024-01-02", "4.31", "25"),
    ]);

    let job = ReportJob::new(
        engine(source, temp_dir.path()),
        Some(RecordingMailer::default()),
        166,
        30,
    );

    assert!(matches!(
        job.run(today()).await,
        Err(ReportError::ZeroBaseline { .. })
    ));
}

#[tokio::test]
async fn test_data_source_failure_propagates() {
    let temp_dir = TempDir::new().unwrap();
    let mailer = RecordingMailer::default();

    let job = ReportJob::new(
        engine(InMemorySource::failing(), temp_dir.path()),
        Some(mailer.clone()),
        166,
        30,
    );
    let err = job.run(today()).await.unwrap_err();

    assert!(matches!(err, ReportError::DataSource { .. }));
    assert!(err.is_retryable());
    assert!(mailer.sent.lock().await.is_empty());
}

#[tokio::test]
async fn test_delivery_failure_keeps_generated_report() {
    let temp_dir = TempDir::new().unwrap();
    let mailer = RecordingMailer {
        fail: true,
        ..RecordingMailer::default()
    };

    let job = ReportJob::new(
        engine(InMemorySource::new(flat_rows()), temp_dir.path()),
        Some(mailer),
        166,
        30,
    );
    let err = job.run(today()).await.unwrap_err();

    assert!(matches!(err, ReportError::Delivery { .. }));
    assert!(temp_dir
        .path()
        .join("report_2024-01-01_2024-01-30.png")
        .exists());
}

#[tokio::test]
async fn test_rerun_without_mailer_overwrites_same_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("report_2024-01-01_2024-01-30.png");
    std::fs::write(&path, b"stale").unwrap();

    let job = ReportJob::<_, _, RecordingMailer>::new(
        engine(InMemorySource::new(flat_rows()), temp_dir.path()),
        None,
        166,
        30,
    );
    let first = job.run(today()).await.unwrap();
    let second = job.run(today()).await.unwrap();

    assert_eq!(first.file_path, second.file_path);
    assert_eq!(first.file_path, path);
    assert_ne!(std::fs::read(&path).unwrap(), b"stale");
}
