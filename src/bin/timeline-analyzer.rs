//! timeline-analyzer CLI - reports from a location-history export
//!
//! Usage:
//!   timeline-analyzer visits [--postcode <code> | --any-postcode]
//!   timeline-analyzer trip-log
//!   timeline-analyzer diagnose
//!   timeline-analyzer all
//!
//! Global options (`--config`, `--input`, `--output-dir`, `--year`,
//! `--offline`, `--verbose`) override the configuration file.

use clap::{Parser, Subcommand};
use log::{error, info};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use timeline_analyzer::{
    diagnostics::diagnose,
    load_timeline,
    reports::{build_trip_log, collect_visits, daily_distances, visit_rows, CsvRow, ReportWriter},
    AnalyzerConfig, CachingGeocoder, NominatimClient, OfflineGeocoder, Result, ReverseGeocoder,
    Timeline,
};

#[derive(Parser)]
#[command(name = "timeline-analyzer")]
#[command(about = "Visit, distance and trip-log reports from a location-history export", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Location-history export (overrides the configuration)
    #[arg(short, long, global = true)]
    input: Option<PathBuf>,

    /// Directory for the CSV reports
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    /// Year to analyze
    #[arg(short, long, global = true)]
    year: Option<i32>,

    /// Skip reverse geocoding; addresses fall back to coordinates
    #[arg(long, global = true)]
    offline: bool,

    /// Enable verbose debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Visits near the target area and distance per day
    Visits {
        /// Keep only visits whose address has this postcode
        #[arg(long, conflicts_with = "any_postcode")]
        postcode: Option<String>,

        /// Keep every visit inside the radius, whatever its postcode
        #[arg(long)]
        any_postcode: bool,
    },

    /// Trip log for days touching a point of interest
    TripLog,

    /// Coverage summary around the target area
    Diagnose,

    /// All of the above
    All,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(&cli.command, &config)) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(failed) => {
            error!("{} report(s) could not be written", failed);
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Configuration file (or defaults) with command-line overrides applied.
fn load_config(cli: &Cli) -> Result<AnalyzerConfig> {
    let mut config = match &cli.config {
        Some(path) => AnalyzerConfig::from_file(path)?,
        None => AnalyzerConfig::default(),
    };

    if let Some(input) = &cli.input {
        config.input_path = input.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(year) = cli.year {
        config.year = year;
    }
    if cli.offline {
        config.geocoder.enabled = false;
    }
    if let Commands::Visits {
        postcode,
        any_postcode,
    } = &cli.command
    {
        if *any_postcode {
            config.target.postcode = None;
        } else if let Some(postcode) = postcode {
            config.target.postcode = Some(postcode.clone());
        }
    }

    config.validate()?;
    Ok(config)
}

/// Run `command`; returns the number of reports that failed to write.
async fn run(command: &Commands, config: &AnalyzerConfig) -> Result<usize> {
    let timeline = load_timeline(&config.input_path)?;

    if let Commands::Diagnose = command {
        print_diagnostics(&timeline, config);
        return Ok(0);
    }

    if !config.geocoder.enabled {
        info!("Running offline, no addresses will be resolved");
        return Ok(run_reports(command, &timeline, config, &OfflineGeocoder).await);
    }

    let geocoder = CachingGeocoder::new(NominatimClient::new(&config.geocoder)?);
    let failed = run_reports(command, &timeline, config, &geocoder).await;

    let (lookups, hits) = geocoder.stats();
    info!(
        "Geocoding: {} lookups, {} cache hits, {} requests, {} failures",
        lookups,
        hits,
        geocoder.inner().request_count(),
        geocoder.inner().failure_count()
    );
    Ok(failed)
}

async fn run_reports<G: ReverseGeocoder>(
    command: &Commands,
    timeline: &Timeline,
    config: &AnalyzerConfig,
    geocoder: &G,
) -> usize {
    let mut writer = ReportWriter::new();

    if matches!(command, Commands::Visits { .. } | Commands::All) {
        visit_reports(timeline, config, geocoder, &mut writer).await;
    }
    if matches!(command, Commands::TripLog | Commands::All) {
        trip_log_reports(timeline, config, geocoder, &mut writer).await;
    }
    if matches!(command, Commands::All) {
        print_diagnostics(timeline, config);
    }

    writer.failed()
}

fn print_header(title: &str) {
    println!("\n{}", "=".repeat(60));
    println!("{}", title);
    println!("{}", "=".repeat(60));
}

fn write_report<R: CsvRow>(writer: &mut ReportWriter, path: &Path, rows: &[R]) {
    if writer.write(path, rows) {
        println!("  Wrote {} ({} rows)", path.display(), rows.len());
    }
}

async fn visit_reports<G: ReverseGeocoder>(
    timeline: &Timeline,
    config: &AnalyzerConfig,
    geocoder: &G,
    writer: &mut ReportWriter,
) {
    let target = &config.target;
    print_header(&format!(
        "Visits {} within {:.1} km of {}{}",
        config.year,
        target.radius_km,
        target.center(),
        target
            .postcode
            .as_deref()
            .map(|p| format!(" (postcode {})", p))
            .unwrap_or_default()
    ));

    let visits = collect_visits(timeline, config, geocoder).await;
    if visits.is_empty() {
        println!("  No visits found, no reports written");
        return;
    }

    let rows = visit_rows(&visits);
    let days = daily_distances(&visits);
    let total_km: f64 = days.iter().map(|d| d.total_km).sum();

    println!("  Visits: {}", rows.len());
    println!("  Days:   {}", days.len());
    println!("  Total:  {:.3} km", total_km);

    write_report(writer, &config.visits_report_path(), &rows);
    write_report(writer, &config.daily_distance_report_path(), &days);
}

async fn trip_log_reports<G: ReverseGeocoder>(
    timeline: &Timeline,
    config: &AnalyzerConfig,
    geocoder: &G,
    writer: &mut ReportWriter,
) {
    print_header(&format!("Trip log {}", config.year));

    let selector = config.waypoint_selector();
    let log = build_trip_log(timeline, config, &selector, geocoder).await;

    for day in &log.summaries {
        println!(
            "  {} {:<28} {} - {}  {:>8.2} km  ({} waypoints)",
            day.date,
            day.reason,
            day.start_time.format("%H:%M"),
            day.end_time.format("%H:%M"),
            day.total_km,
            day.waypoint_count
        );
    }
    if !log.skipped_days.is_empty() {
        println!("  Skipped (too little movement): {}", log.skipped_days.len());
    }
    println!("  Logged days: {}", log.summaries.len());
    println!("  Total:       {:.2} km", log.total_distance_km());
    println!("  Per day:     {:.2} km", log.average_per_day());

    write_report(writer, &config.trip_summary_path(), &log.summaries);
    write_report(writer, &config.trip_detail_path(), &log.details);
}

fn print_diagnostics(timeline: &Timeline, config: &AnalyzerConfig) {
    print_header(&format!(
        "Coverage {} within {:.1} km of {}",
        config.year,
        config.target.radius_km,
        config.target.center()
    ));
    print!("{}", diagnose(timeline, config));
}
