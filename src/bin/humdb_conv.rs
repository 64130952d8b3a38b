use std::fs;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use humdb_converter::config::{ConfigLoader, Overrides};
use humdb_converter::error::ConvertError;
use humdb_converter::output::ValidationReport;
use humdb_converter::runner;
use humdb_converter::store::Store;

#[derive(Parser)]
#[command(name = "humdb-conv")]
#[command(about = "Converts scraped NBDC research-document snapshots into versioned entity documents")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Convert all (or selected) documents under the input root")]
    Run(RunArgs),
    #[command(about = "Print the validation report from the last run")]
    Report(ReportArgs),
}

#[derive(Args)]
struct RunArgs {
    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    input: Option<String>,

    #[arg(long)]
    output: Option<String>,

    #[arg(long)]
    cache: Option<String>,

    #[arg(long)]
    workers: Option<usize>,

    /// Fold both language editions into single documents.
    #[arg(long)]
    unified: bool,

    /// Document ids to convert; defaults to every id under the input root.
    hum_ids: Vec<String>,
}

#[derive(Args)]
struct ReportArgs {
    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    output: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<ConvertError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &ConvertError) -> u8 {
    match error {
        ConvertError::MissingConfig
        | ConvertError::InvalidHumId(_)
        | ConvertError::InvalidDatasetId(_)
        | ConvertError::InvalidLang(_)
        | ConvertError::NoSnapshots(_) => 2,
        ConvertError::DdbjHttp(_) | ConvertError::DdbjStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run_convert(args),
        Commands::Report(args) => run_report(args),
    }
}

fn run_convert(args: RunArgs) -> miette::Result<()> {
    let overrides = Overrides {
        input_dir: args.input,
        output_dir: args.output,
        cache_dir: args.cache,
        workers: args.workers,
        unified: args.unified,
        hum_ids: args.hum_ids,
    };
    let config = ConfigLoader::resolve(args.config.as_deref(), &overrides).into_diagnostic()?;
    let summary = runner::run(&config).into_diagnostic()?;

    println!(
        "converted {} document(s), {} skipped, {} failed, {} validation warning(s)",
        summary.converted, summary.skipped, summary.failed, summary.warnings
    );
    if summary.failed > 0 {
        return Err(miette::Report::msg(format!(
            "{} document(s) failed to convert",
            summary.failed
        )));
    }
    Ok(())
}

fn run_report(args: ReportArgs) -> miette::Result<()> {
    let overrides = Overrides {
        output_dir: args.output,
        // The report only needs the output root; any input value satisfies
        // resolution when no config file is present.
        input_dir: Some(".".to_string()),
        ..Overrides::default()
    };
    let config = ConfigLoader::resolve(args.config.as_deref(), &overrides).into_diagnostic()?;
    let store = Store::new(config.input_dir, config.output_dir).into_diagnostic()?;

    let path = store.report_path();
    let content = fs::read_to_string(path.as_std_path())
        .map_err(|err| ConvertError::Filesystem(format!("{path}: {err}")))
        .into_diagnostic()?;
    let report: ValidationReport = serde_json::from_str(&content).into_diagnostic()?;

    println!(
        "validation report generated at {} with {} warning(s)",
        report.generated_at,
        report.warnings.len()
    );
    for warning in &report.warnings {
        println!(
            "{} v{} [{}] {}: missing {}",
            warning.hum_id, warning.revision, warning.lang, warning.dataset_id, warning.field
        );
    }
    Ok(())
}
