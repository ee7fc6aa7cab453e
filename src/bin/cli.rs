use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rxclaims::config::{self as rxconfig, RxConfig};
use rxclaims::constants::{DEFAULT_ARCHIVE, DEFAULT_EXTRACT_DIR};
use rxclaims::export::{exporter_for, write_reports_with};
use rxclaims::logging::{init_logging, LogConfig, LogFormat};
use rxclaims::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "rxcli")]
#[command(
    version,
    about = "Pharmacy claims CLI - fill metrics, chain recommendations and common quantities",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormatOpt::Compact, global = true)]
    log_format: LogFormatOpt,

    /// Configuration file (TOML); defaults to the user config directory
    #[arg(long, global = true, env = "RXCLAIMS_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the data directory, compute all reports and write them
    Run(RunArgs),
    /// Compute a single report
    Report(ReportArgs),
    /// Show summary statistics for a data directory
    Stats(StatsArgs),
    /// Extract a .tar.gz data bundle
    #[cfg(feature = "archive")]
    Extract(ExtractArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Directory containing the claims, reverts and pharmacies folders
    #[arg(short, long, default_value = DEFAULT_EXTRACT_DIR)]
    data_dir: PathBuf,
    /// Extract this bundle into the data directory first
    #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_ARCHIVE)]
    archive: Option<PathBuf>,
    /// Where to write the reports (defaults to the data directory)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
    /// Report format
    #[arg(long, value_enum)]
    format: Option<ExportFormatOpt>,
}

#[derive(Args)]
struct ReportArgs {
    /// Which report to compute
    #[arg(value_enum)]
    kind: ReportKind,
    /// Directory containing the claims, reverts and pharmacies folders
    #[arg(short, long, default_value = DEFAULT_EXTRACT_DIR)]
    data_dir: PathBuf,
    /// Write JSON to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Chains kept per drug, or highest quantity rank kept per drug
    #[arg(long)]
    top: Option<usize>,
}

#[derive(Args)]
struct StatsArgs {
    /// Directory containing the claims, reverts and pharmacies folders
    #[arg(short, long, default_value = DEFAULT_EXTRACT_DIR)]
    data_dir: PathBuf,
}

#[cfg(feature = "archive")]
#[derive(Args)]
struct ExtractArgs {
    /// Bundle to extract
    #[arg(short, long, default_value = DEFAULT_ARCHIVE)]
    archive: PathBuf,
    /// Output directory
    #[arg(short, long, default_value = DEFAULT_EXTRACT_DIR)]
    out_dir: PathBuf,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ReportKind {
    Metrics,
    Recommend,
    Quantities,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ExportFormatOpt {
    Json,
    Jsonl,
    Csv,
}

impl From<ExportFormatOpt> for ExportFormat {
    fn from(opt: ExportFormatOpt) -> Self {
        match opt {
            ExportFormatOpt::Json => ExportFormat::Json,
            ExportFormatOpt::Jsonl => ExportFormat::JsonLines,
            ExportFormatOpt::Csv => ExportFormat::Csv,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum LogFormatOpt {
    Pretty,
    Compact,
    Json,
}

impl From<LogFormatOpt> for LogFormat {
    fn from(opt: LogFormatOpt) -> Self {
        match opt {
            LogFormatOpt::Pretty => LogFormat::Pretty,
            LogFormatOpt::Compact => LogFormat::Compact,
            LogFormatOpt::Json => LogFormat::Json,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::from_verbosity(cli.verbose, cli.quiet)
        .with_format(cli.log_format.into());
    if let Err(e) = init_logging(&log_config) {
        eprintln!("Warning: {}", e);
    }

    if let Err(e) = run(cli) {
        match e.downcast_ref::<RxError>() {
            // outermost context, then the library error with its suggestion
            Some(rx) => eprintln!("Error: {}\n{}", e, rx.user_message()),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = RxConfig::load_layered(cli.config.as_deref())
        .context("Failed to load configuration")?;

    if let Some(threads) = config.parallel_threads {
        if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(threads).build_global() {
            tracing::warn!("could not size the thread pool: {}", e);
        }
    }
    rxconfig::set_global_config(config.clone());

    match cli.command {
        Commands::Run(args) => cmd_run(args, &config),
        Commands::Report(args) => cmd_report(args, &config),
        Commands::Stats(args) => cmd_stats(args, &config),
        #[cfg(feature = "archive")]
        Commands::Extract(args) => cmd_extract(args),
    }
}

fn load_dataset(data_dir: &Path, config: &RxConfig) -> anyhow::Result<ClaimsDataset> {
    let dataset = ClaimsDatasetBuilder::from_config(data_dir, config)?
        .build()
        .with_context(|| format!("Error loading dataset from {}", data_dir.display()))?;
    Ok(dataset)
}

fn cmd_run(args: RunArgs, config: &RxConfig) -> anyhow::Result<()> {
    if let Some(archive) = args.archive.as_deref() {
        extract(archive, &args.data_dir)?;
    }

    let dataset = load_dataset(&args.data_dir, config)?;
    let reports = dataset
        .analytics()
        .with_top_chains(config.top_chains)
        .with_max_quantity_rank(config.max_quantity_rank)
        .reports();

    let format = args
        .format
        .map(ExportFormat::from)
        .unwrap_or(config.default_export_format);
    let output_dir = args
        .output_dir
        .or_else(|| config.output_dir.clone())
        .unwrap_or_else(|| args.data_dir.clone());

    let exporter = exporter_for(format, config.pretty_print);
    let paths = write_reports_with(&output_dir, &reports, exporter.as_ref())
        .with_context(|| format!("Failed to write reports to {}", output_dir.display()))?;

    for path in paths {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn cmd_report(args: ReportArgs, config: &RxConfig) -> anyhow::Result<()> {
    if args.top == Some(0) {
        bail!("--top must be at least 1");
    }

    let dataset = load_dataset(&args.data_dir, config)?;
    let analytics = dataset
        .analytics()
        .with_top_chains(args.top.unwrap_or(config.top_chains))
        .with_max_quantity_rank(args.top.unwrap_or(config.max_quantity_rank));

    let output = args.output.as_deref();
    match args.kind {
        ReportKind::Metrics => emit(&analytics.metrics(), output, config.pretty_print),
        ReportKind::Recommend => {
            emit(&analytics.chain_recommendations(), output, config.pretty_print)
        }
        ReportKind::Quantities => emit(&analytics.common_quantities(), output, config.pretty_print),
    }
}

fn emit<T: Serialize>(report: &T, output: Option<&Path>, pretty: bool) -> anyhow::Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(report)?
    } else {
        serde_json::to_string(report)?
    };

    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn cmd_stats(args: StatsArgs, config: &RxConfig) -> anyhow::Result<()> {
    let dataset = load_dataset(&args.data_dir, config)?;
    dataset.statistics().print_summary();
    Ok(())
}

#[cfg(feature = "archive")]
fn cmd_extract(args: ExtractArgs) -> anyhow::Result<()> {
    extract(&args.archive, &args.out_dir)
}

#[cfg(feature = "archive")]
fn extract(archive: &Path, out_dir: &Path) -> anyhow::Result<()> {
    let bundle = rxclaims::archive::extract_tar_gz(archive, out_dir)
        .with_context(|| format!("Failed to extract {}", archive.display()))?;
    println!("Extracted {} files to {}", bundle.files, bundle.directory.display());
    Ok(())
}

#[cfg(not(feature = "archive"))]
fn extract(archive: &Path, _out_dir: &Path) -> anyhow::Result<()> {
    bail!(
        "cannot extract {}: rxcli was built without the `archive` feature",
        archive.display()
    )
}
