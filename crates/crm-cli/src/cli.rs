//! CLI argument definitions for the migration tool.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "crm-migrator",
    version,
    about = "Cross-account CRM migration - move fields, pipelines, contacts and opportunities",
    long_about = "Move structured CRM data from one account to another through the \
                  rate-limited REST API.\n\n\
                  Schemas are resolved by exact, synonym, and fuzzy name matching; a \
                  readiness score gates record migration; contacts are deduplicated \
                  against the destination by email or phone."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for warnings only).
    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Map both schemas and report readiness without writing anything.
    Preview(PreviewArgs),

    /// Run the full migration: fields, pipelines, contacts, opportunities.
    Migrate(MigrateArgs),
}

#[derive(Parser)]
pub struct AccountArgs {
    /// Source account API key (falls back to CRM_SOURCE_API_KEY).
    #[arg(long = "source-key", value_name = "KEY")]
    pub source_key: Option<String>,

    /// Destination account API key (falls back to CRM_DESTINATION_API_KEY).
    #[arg(long = "destination-key", value_name = "KEY")]
    pub destination_key: Option<String>,

    /// API base URL.
    #[arg(
        long = "base-url",
        value_name = "URL",
        default_value = "https://rest.gohighlevel.com/v1"
    )]
    pub base_url: String,

    /// Minimum similarity score for an automatic fuzzy match.
    #[arg(long = "similarity-threshold", value_name = "RATIO", default_value_t = 0.80)]
    pub similarity_threshold: f32,
}

#[derive(Parser)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub account: AccountArgs,
}

#[derive(Parser)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub account: AccountArgs,

    /// Records per batch for progress reporting and cancellation checks.
    #[arg(long = "batch-size", value_name = "N", default_value_t = 20)]
    pub batch_size: usize,

    /// Pacing delay between API requests, in seconds.
    #[arg(long = "request-delay", value_name = "SECONDS", default_value_t = 0.2)]
    pub request_delay: f64,

    /// Maximum retries on HTTP 429 before a request gives up.
    #[arg(long = "max-retries", value_name = "N", default_value_t = 3)]
    pub max_retries: u32,

    /// Create unresolved fields and stages in the destination on demand.
    #[arg(long = "auto-create")]
    pub auto_create: bool,

    /// Proceed even when the readiness score is LOW.
    #[arg(long = "allow-low-readiness")]
    pub allow_low_readiness: bool,

    /// Write the finished run as JSON to this path.
    #[arg(long = "report", value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Identifier for this run (defaults to a timestamp-derived id).
    #[arg(long = "run-id", value_name = "ID")]
    pub run_id: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
