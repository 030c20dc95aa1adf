use crate::utils::error::{ReportError, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{Builder, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("charges_report=debug,info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("charges_report=info"))
    }
}

/// Daily-rotating `log.YYYY-MM-DD.txt` files under `log_dir`, mirrored to stdout.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// whole run.
pub fn init_logger(log_dir: &Path, retention_days: usize, verbose: bool) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    let appender = Builder::new()
        .rotation(Rotation::DAILY)
        .filename_prefix("log")
        .filename_suffix("txt")
        .max_log_files(retention_days)
        .build(log_dir)
        .map_err(|e| ReportError::config(format!("log directory {}: {}", log_dir.display(), e)))?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(false),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init()
        .map_err(|e| ReportError::config(format!("logger already initialised: {}", e)))?;

    Ok(guard)
}
