use clap::Parser;
use std::path::PathBuf;

/// Scheduled runs pass no arguments; the flags exist for operators rerunning by hand.
#[derive(Debug, Clone, Parser)]
#[command(name = "charges-report")]
#[command(about = "Charts daily charges and emails the day-over-day variation")]
pub struct CliArgs {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Generate the chart but skip sending the email
    #[arg(long)]
    pub no_email: bool,
}
