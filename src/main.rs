//! CLI entry point for the tag presence reports.
//!
//! Each subcommand runs one pipeline stage. Settings come from a named
//! profile in the profile book (or the defaults), then from the flags given
//! on the command line.

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tag_presence::config::{
    AggregationPolicy, Granularity, PipelineConfig, ProfileBook, ReservationAxis, SubjectKey,
    UnaffiliatedPolicy,
};
use tag_presence::error::PipelineResult;
use tag_presence::fetch::DynamoStore;
use tag_presence::infra::s3::PublishTarget;
use tag_presence::pipeline;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "tag_presence")]
#[command(about = "Closest-node resolution and presence reports for tag telemetry", long_about = None)]
struct Cli {
    /// Profile book (JSON) holding named presets
    #[arg(long, global = true, default_value = "profiles.json")]
    config: PathBuf,

    /// Profile to start from; the built-in defaults when omitted
    #[arg(long, global = true)]
    profile: Option<String>,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

/// Flags that override the selected profile.
#[derive(Args, Default)]
struct Overrides {
    /// Bucket width in minutes
    #[arg(long, global = true)]
    bucket_minutes: Option<u32>,

    /// How the closest node is chosen within a bucket
    #[arg(long, global = true, value_enum)]
    policy: Option<AggregationPolicy>,

    /// Period of the index reports
    #[arg(long, global = true, value_enum)]
    granularity: Option<Granularity>,

    /// Who an index row describes
    #[arg(long, global = true, value_enum)]
    subject: Option<SubjectKey>,

    /// First day to include (YYYY-MM-DD)
    #[arg(long, global = true)]
    start_date: Option<NaiveDate>,

    /// Last day to include, whole day (YYYY-MM-DD)
    #[arg(long, global = true)]
    end_date: Option<NaiveDate>,

    /// Only these tag ids (repeatable)
    #[arg(long = "include-tag", global = true)]
    include_tags: Vec<String>,

    /// Never these tag ids (repeatable)
    #[arg(long = "exclude-tag", global = true)]
    exclude_tags: Vec<String>,

    /// Only these departments (repeatable)
    #[arg(long = "department", global = true)]
    departments: Vec<String>,

    /// What to do with tags missing from the tag table
    #[arg(long, global = true, value_enum)]
    unaffiliated: Option<UnaffiliatedPolicy>,

    /// Roster column plotted by `compare`
    #[arg(long, global = true, value_enum)]
    reservation_axis: Option<ReservationAxis>,

    /// Directory for report CSVs and charts
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,
}

impl Overrides {
    fn apply(self, cfg: &mut PipelineConfig) {
        if let Some(v) = self.bucket_minutes {
            cfg.bucket_minutes = v;
        }
        if let Some(v) = self.policy {
            cfg.policy = v;
        }
        if let Some(v) = self.granularity {
            cfg.granularity = v;
        }
        if let Some(v) = self.subject {
            cfg.subject = v;
        }
        if self.start_date.is_some() {
            cfg.filters.start_date = self.start_date;
        }
        if self.end_date.is_some() {
            cfg.filters.end_date = self.end_date;
        }
        if !self.include_tags.is_empty() {
            cfg.filters.include_tags = self.include_tags;
        }
        if !self.exclude_tags.is_empty() {
            cfg.filters.exclude_tags = self.exclude_tags;
        }
        if !self.departments.is_empty() {
            cfg.filters.departments = self.departments;
        }
        if let Some(v) = self.unaffiliated {
            cfg.unaffiliated = v;
        }
        if let Some(v) = self.reservation_axis {
            cfg.reservation_axis = v;
        }
        if let Some(v) = self.output_dir {
            cfg.paths.output_dir = v;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Download raw readings from DynamoDB into the raw readings CSV
    Fetch {
        /// Partition key value (site)
        #[arg(long)]
        partition: Option<String>,

        /// Range start in the store's format, e.g. "2025/09/01 08:00:00.000"
        #[arg(long)]
        start: Option<String>,

        /// Range end in the store's format
        #[arg(long)]
        end: Option<String>,
    },
    /// Resolve the closest node per tag per bucket
    Resolve,
    /// Attach place and tag names to resolved positions
    Enrich,
    /// Per-person mobility index (HHI) with line chart and heatmap
    Mobility,
    /// Per-department dispersion index (HHI) with line chart and heatmap
    Dispersion,
    /// Effective-location tables for days, weeks and months
    Effective,
    /// Work-style charts from the effective-location tables
    Workstyle,
    /// Distinct people per place over time
    Occupancy,
    /// Stacked stay breakdowns, overall and per period
    Totalling,
    /// Closest place over time per person
    Movement,
    /// Sensor positions against the reservation roster
    Compare,
    /// Check-in counts per person from the reservation roster
    Ranking,
    /// Latest voltage per registered tag
    Voltage,
    /// Extract one tag's raw readings
    SelectTag {
        #[arg(value_name = "TAG_ID")]
        tag_id: String,
    },
    /// Upload report artifacts to S3
    Publish {
        /// S3 bucket name (e.g., "my-bucket")
        #[arg(long)]
        s3_bucket: String,

        /// Key prefix inside the bucket
        #[arg(long, default_value = "")]
        prefix: String,

        /// Gzip compress artifacts before uploading
        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
    /// List the profiles of the profile book
    Profiles,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/tag_presence.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("tag_presence.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    if let Commands::Profiles = cli.command {
        let book = ProfileBook::load(&cli.config)?;
        for name in book.names() {
            info!(profile = name, "Profile");
        }
        return Ok(());
    }

    let cfg = load_config(&cli.config, cli.profile.as_deref(), cli.overrides)?;
    debug!(?cfg, "Configuration resolved");

    let outcome = match cli.command {
        Commands::Fetch { partition, start, end } => {
            let mut cfg = cfg;
            if let Some(v) = partition {
                cfg.source.partition_value = v;
            }
            if let Some(v) = start {
                cfg.source.start = v;
            }
            if let Some(v) = end {
                cfg.source.end = v;
            }
            let sdk = aws_config::load_from_env().await;
            let store = DynamoStore::new(&sdk, &cfg.source);
            pipeline::fetch(&cfg, &store).await
        }
        Commands::Resolve => pipeline::resolve(&cfg),
        Commands::Enrich => pipeline::enrich(&cfg),
        Commands::Mobility => pipeline::mobility(&cfg),
        Commands::Dispersion => pipeline::dispersion(&cfg),
        Commands::Effective => pipeline::effective(&cfg),
        Commands::Workstyle => pipeline::workstyle(&cfg),
        Commands::Occupancy => pipeline::occupancy(&cfg),
        Commands::Totalling => pipeline::totalling(&cfg),
        Commands::Movement => pipeline::movement(&cfg),
        Commands::Compare => pipeline::compare(&cfg),
        Commands::Ranking => pipeline::ranking(&cfg),
        Commands::Voltage => pipeline::voltage(&cfg),
        Commands::SelectTag { tag_id } => pipeline::select_tag(&cfg, &tag_id),
        Commands::Publish { s3_bucket, prefix, gzip } => {
            if s3_bucket.is_empty() {
                bail!("S3 bucket name must not be empty");
            }
            let sdk = aws_config::load_from_env().await;
            let s3 = aws_sdk_s3::Client::new(&sdk);
            let target = PublishTarget { bucket: s3_bucket, prefix, gzip };
            info!(bucket = %target.bucket, gzip, "S3 upload enabled");
            pipeline::publish(&cfg, &s3, &target).await.map(|_| Vec::new())
        }
        Commands::Profiles => Ok(Vec::new()),
    };

    report(outcome)
}

/// Starts from the named profile (or the defaults) and applies the flags.
fn load_config(book_path: &Path, profile: Option<&str>, overrides: Overrides) -> Result<PipelineConfig> {
    let mut cfg = match profile {
        Some(name) => {
            let book = ProfileBook::load(book_path)?;
            book.get(name).cloned().with_context(|| {
                let known: Vec<&str> = book.names().collect();
                format!("unknown profile '{name}' (known: {})", known.join(", "))
            })?
        }
        None => PipelineConfig::default(),
    };
    overrides.apply(&mut cfg);
    cfg.validate()?;
    Ok(cfg)
}

/// An empty result is a warning; any other failure ends the run.
fn report(outcome: PipelineResult<Vec<PathBuf>>) -> Result<()> {
    match outcome {
        Ok(artifacts) => {
            for path in &artifacts {
                info!(path = %path.display(), "Artifact written");
            }
            info!(artifacts = artifacts.len(), "Done");
            Ok(())
        }
        Err(e) if e.is_empty_result() => {
            warn!(reason = %e, "Nothing to emit, charts skipped");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Stage failed");
            Err(e.into())
        }
    }
}
