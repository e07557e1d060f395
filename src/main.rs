//! CLI entry point for the ridership forecaster.
//!
//! Provides subcommands for the full train-and-predict run, for dumping the
//! engineered feature table, and for listing the holiday calendar.

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use ridership_forecast::config::{DegeneratePolicy, HolidaySource, PipelineConfig};
use ridership_forecast::output::{print_json, write_features};
use ridership_forecast::pipeline::{self, build_calendar};
use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "ridership_forecast")]
#[command(about = "Forecast daily station ridership from weather and calendar features", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train on rows up to the cutoff, predict the rest and report RMSE
    Predict {
        #[command(flatten)]
        input: InputArgs,

        /// CSV file to write evaluation-window predictions to
        #[arg(short, long, env = "RIDERSHIP_OUTPUT", default_value = "mbta_test_predictions.csv")]
        output: PathBuf,

        /// Optional JSON run report
        #[arg(long, env = "RIDERSHIP_REPORT")]
        report: Option<PathBuf>,

        /// Last service date used for training (inclusive)
        #[arg(long, env = "RIDERSHIP_CUTOFF", default_value = "2022-03-01")]
        cutoff: NaiveDate,

        /// First date of the evaluation window (inclusive)
        #[arg(long, env = "RIDERSHIP_EVAL_START", default_value = "2022-03-02")]
        eval_start: NaiveDate,

        /// Last date of the evaluation window (inclusive)
        #[arg(long, env = "RIDERSHIP_EVAL_END", default_value = "2023-03-01")]
        eval_end: NaiveDate,

        /// Candidate ridge penalties, comma separated
        #[arg(long, env = "RIDERSHIP_ALPHAS", value_delimiter = ',', default_value = "0.1,1,10")]
        alphas: Vec<f64>,

        /// Polynomial expansion degree
        #[arg(long, env = "RIDERSHIP_DEGREE", default_value_t = 2)]
        degree: usize,

        /// Number of time-series cross-validation folds
        #[arg(long, env = "RIDERSHIP_CV_FOLDS", default_value_t = 5)]
        cv_folds: usize,

        /// Fail instead of dropping feature columns that are constant in training
        #[arg(long, env = "RIDERSHIP_STRICT_FEATURES", default_value_t = false)]
        strict_features: bool,
    },
    /// Engineer features and write the derived table without training
    Features {
        #[command(flatten)]
        input: InputArgs,

        /// CSV file to write the derived table to
        #[arg(short, long, default_value = "features.csv")]
        output: PathBuf,
    },
    /// List the holiday calendar for a range of years
    Holidays {
        /// First year (inclusive)
        #[arg(long)]
        from: i32,

        /// Last year (inclusive)
        #[arg(long)]
        to: i32,

        /// CSV file with a `date` column instead of the US federal calendar
        #[arg(long, env = "RIDERSHIP_HOLIDAYS")]
        holidays: Option<PathBuf>,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Merged ridership/weather CSV (optionally .gz)
    #[arg(short, long, env = "RIDERSHIP_INPUT", default_value = "data/processed/merged_mbta_weather.csv")]
    input: PathBuf,

    /// Trailing window for the rolling ridership mean, in rows
    #[arg(long, env = "RIDERSHIP_ROLL_WINDOW", default_value_t = 7)]
    roll_window: usize,

    /// CSV file with a `date` column instead of the US federal calendar
    #[arg(long, env = "RIDERSHIP_HOLIDAYS")]
    holidays: Option<PathBuf>,
}

fn holiday_source(path: Option<PathBuf>) -> HolidaySource {
    path.map_or(HolidaySource::UsFederal, HolidaySource::File)
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let _file_guard = init_logging()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Predict {
            input,
            output,
            report,
            cutoff,
            eval_start,
            eval_end,
            alphas,
            degree,
            cv_folds,
            strict_features,
        } => {
            let config = PipelineConfig {
                input: input.input,
                output,
                report,
                cutoff,
                eval_start,
                eval_end,
                alphas,
                degree,
                roll_window: input.roll_window,
                cv_folds,
                holidays: holiday_source(input.holidays),
                degenerate: if strict_features {
                    DegeneratePolicy::Fail
                } else {
                    DegeneratePolicy::Drop
                },
            };
            print_json(&config).context("logging configuration")?;

            let summary = pipeline::run(&config).inspect_err(|e| {
                error!(stage = %e.stage(), error = %e, "Pipeline failed");
            })
            .with_context(|| format!("forecasting from {}", config.input.display()))?;

            info!(
                rmse = summary.rmse,
                alpha = summary.alpha,
                output = %config.output.display(),
                "Run complete"
            );
            println!("Evaluation window RMSE: {:.2}", summary.rmse);
            println!("Test period RMSE: {:.2}", summary.test_metrics.rmse);
        }
        Commands::Features { input, output } => {
            let config = PipelineConfig {
                input: input.input,
                roll_window: input.roll_window,
                holidays: holiday_source(input.holidays),
                ..Default::default()
            };

            let (_, rows) = pipeline::derive_features(&config).inspect_err(|e| {
                error!(stage = %e.stage(), error = %e, "Feature derivation failed");
            })
            .with_context(|| format!("deriving features from {}", config.input.display()))?;
            write_features(&output, &rows)
                .with_context(|| format!("writing features to {}", output.display()))?;
        }
        Commands::Holidays { from, to, holidays } => {
            if from > to {
                bail!("--from {from} is after --to {to}");
            }
            let years: BTreeSet<i32> = (from..=to).collect();
            let calendar = build_calendar(&holiday_source(holidays), &years)
                .context("building holiday calendar")?;
            for date in calendar.dates() {
                println!("{date}");
            }
        }
    }

    Ok(())
}

/// Colored stderr plus a daily-rolling JSON log file.
fn init_logging() -> Result<WorkerGuard> {
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/ridership_forecast.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("ridership_forecast.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

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

    Ok(file_guard)
}
