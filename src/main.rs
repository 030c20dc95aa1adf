use anyhow::Context;
use charges_report::utils::{logger, validation::Validate};
use charges_report::{CliArgs, ReportConfig, ReportJob};
use clap::Parser;
use std::process::ExitCode;

fn load_config(args: &CliArgs) -> anyhow::Result<ReportConfig> {
    let config = ReportConfig::from_file(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    config.validate().context("validating configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    // Logging is configured by the file, so config errors go to stderr.
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {:#}", e);
            eprintln!("💡 Make sure the file exists, is valid TOML and has every required key");
            return ExitCode::FAILURE;
        }
    };

    let _guard = match logger::init_logger(
        &config.logging.dir,
        config.logging.retention_days,
        args.verbose,
    ) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("❌ Could not set up logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    tracing::info!("🚀 Starting charges report");
    if args.verbose {
        tracing::debug!("CLI args: {:?}", args);
    }

    let job = match ReportJob::from_config(&config, !args.no_email) {
        Ok(job) => job,
        Err(e) => {
            tracing::error!("❌ Could not prepare the report job: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            return ExitCode::FAILURE;
        }
    };

    let today = chrono::Local::now().date_naive();
    match job.run(today).await {
        Ok(artifact) => {
            tracing::info!("📁 Report saved to: {}", artifact.file_path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(
                "❌ Report run failed: {} (Severity: {:?}, retryable: {})",
                e,
                e.severity(),
                e.is_retryable()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            ExitCode::FAILURE
        }
    }
}
