//! CLI entry point for the turnstile ridership pipeline.
//!
//! Provides subcommands for building the merged ridership snapshot, deriving
//! the station mapping for hand curation, and writing the ridership vs. case
//! count report.

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use turnstile_ridership::{
    config::{DEFAULT_YEARS, PipelineConfig},
    enrich::{DEFAULT_WINDOW, load_case_counts},
    fetch::BasicClient,
    normalize::{DEFAULT_MAX_DAY_GAP, DEFAULT_MAX_DELTA, NormalizerConfig},
    pipeline::{build_report, derive_station_mapping, load_or_build, write_report},
    resolve::MappingSource,
};

#[derive(Parser)]
#[command(name = "turnstile_ridership")]
#[command(about = "Reconstructs NYC subway ridership from MTA turnstile counters", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build (or load) the merged ridership snapshot
    Build {
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Derive the unit to station-complex mapping for manual curation
    DeriveMapping {
        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Overwrite an existing mapping file
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Join case counts onto ridership and write the report files
    Report {
        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Path or URL of the daily case-count CSV
        #[arg(long, env = "CASE_SOURCE")]
        cases: Option<String>,

        /// Directory to write the report into
        #[arg(short, long, env = "REPORT_DIR", default_value = "report")]
        output_dir: PathBuf,

        /// Moving-average window in days
        #[arg(short, long, default_value_t = DEFAULT_WINDOW)]
        window: usize,

        /// Number of stations to rank in the summary
        #[arg(long, default_value_t = 10)]
        top_stations: usize,
    },
}

#[derive(Args)]
struct PipelineArgs {
    /// Directory containing turnstile_<year>.csv exports
    #[arg(long, env = "TURNSTILE_DIR", default_value = "data/turnstiles")]
    turnstile_dir: PathBuf,

    /// MTA station table with complex ids and coordinates
    #[arg(long, env = "STATION_LOCATIONS", default_value = "data/stations.csv")]
    stations: PathBuf,

    /// Curated unit to station-complex mapping
    #[arg(long, env = "MAPPING_PATH", default_value = "data/station_mapping.csv")]
    mapping: PathBuf,

    /// Directory holding the ridership snapshot
    #[arg(long, env = "SNAPSHOT_DIR", default_value = "cache")]
    snapshot_dir: PathBuf,

    /// Years to process
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_YEARS)]
    years: Vec<i32>,

    /// Year whose feed seeds a derived mapping (defaults to the first year)
    #[arg(long)]
    mapping_year: Option<i32>,

    /// Largest plausible counter change between two readings
    #[arg(long, default_value_t = DEFAULT_MAX_DELTA)]
    max_delta: u64,

    /// Largest day step between two readings that still counts
    #[arg(long, default_value_t = DEFAULT_MAX_DAY_GAP)]
    max_day_gap: i64,
}

impl PipelineArgs {
    fn into_config(self) -> PipelineConfig {
        let mapping_year = self
            .mapping_year
            .or_else(|| self.years.first().copied())
            .unwrap_or(DEFAULT_YEARS[0]);

        PipelineConfig {
            years: self.years,
            mapping_year,
            turnstile_dir: self.turnstile_dir,
            station_locations: self.stations,
            mapping_path: self.mapping,
            snapshot_dir: self.snapshot_dir,
            normalizer: NormalizerConfig {
                max_delta: self.max_delta,
                max_day_gap: self.max_day_gap,
            },
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/turnstile_ridership.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("turnstile_ridership.log"));

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

    match cli.command {
        Commands::Build { pipeline } => {
            let config = pipeline.into_config();
            let records = load_or_build(&config, &config.mapping_file())?;
            info!(records = records.len(), "Ridership snapshot ready");
        }
        Commands::DeriveMapping { pipeline, force } => {
            let config = pipeline.into_config();
            let file = config.mapping_file();
            if file.path().exists() && !force {
                bail!(
                    "{} already exists; pass --force to overwrite curated edits",
                    file.path().display()
                );
            }

            let rows = derive_station_mapping(&config)?;
            file.store(&rows)?;
            info!(
                rows = rows.len(),
                path = %file.path().display(),
                "Station mapping written for curation"
            );
        }
        Commands::Report {
            pipeline,
            cases,
            output_dir,
            window,
            top_stations,
        } => {
            let config = PipelineConfig {
                report_dir: output_dir,
                case_source: cases,
                moving_average_window: window,
                top_stations,
                ..pipeline.into_config()
            };

            let records = load_or_build(&config, &config.mapping_file())?;
            let client = BasicClient::new()?;
            let cases = load_case_counts(&client, config.case_source.as_deref()).await;
            let report = build_report(&records, &cases, &config);
            let files = write_report(&report, &config.report_dir)?;

            info!(
                series = %files.series.display(),
                stations = %files.stations.display(),
                summary = %files.summary.display(),
                "Report complete"
            );
        }
    }

    Ok(())
}
