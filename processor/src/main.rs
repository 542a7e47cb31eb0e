//! Mugshot charges CLI - pick the notable charge in scraped mugshot CSVs
//!
//! # Commands
//!
//! ```bash
//! mugshot-charges display-crime --input mugshot_ai_v1.csv     # Most dramatic summarized charge
//! mugshot-charges plain-charge --input mugshots_data.csv     # Most interesting raw charge, reworded
//! mugshot-charges peek mugshots_data.csv                     # Inspect a CSV without calling the API
//! ```
//!
//! The API key is read from `OPENAI_API_KEY` (a `.env` file is honoured).

use std::error::Error as _;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};

use mugshot_charges::config::{self, AiSettings, DEFAULT_MODEL};
use mugshot_charges::parser::{self, format_delimiter};
use mugshot_charges::transform::{run_job, DisplayCrimeJob, Job, PlainChargeJob, RunOptions};
use mugshot_charges::{logging, AiClient, BadLines, CsvError, PipelineError};

/// Exit code used when the run is stopped with Ctrl-C
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser)]
#[command(name = "mugshot-charges")]
#[command(about = "Pick and reword the most notable charge in mugshot CSV files", long_about = None)]
struct Cli {
    /// Load environment variables from this file instead of searching for `.env`
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find the most "exciting" summarized charge for display
    DisplayCrime(JobArgs),

    /// Sort inmates by id, pick the most interesting raw charge and reword it in plain English
    PlainCharge(JobArgs),

    /// Show the first lines, delimiter and columns of a CSV file
    Peek {
        /// Input CSV file
        input: PathBuf,

        /// Number of lines to show
        #[arg(short = 'n', long, default_value = "5")]
        lines: usize,
    },
}

#[derive(Args)]
struct JobArgs {
    /// Input CSV file path
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output CSV file path for results
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Maximum number of rows to process (for testing)
    #[arg(long)]
    max_rows: Option<usize>,

    /// Chat model to use
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,
}

#[tokio::main]
async fn main() {
    logging::init("info");
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::DisplayCrime(args) => {
            cmd_job(
                DisplayCrimeJob,
                args,
                cli.env_file.as_deref(),
                DisplayCrimeJob::DEFAULT_INPUT,
                DisplayCrimeJob::DEFAULT_OUTPUT,
            )
            .await
        }

        Commands::PlainCharge(args) => {
            cmd_job(
                PlainChargeJob,
                args,
                cli.env_file.as_deref(),
                PlainChargeJob::DEFAULT_INPUT,
                PlainChargeJob::DEFAULT_OUTPUT,
            )
            .await
        }

        Commands::Peek { input, lines } => cmd_peek(&input, lines),
    };

    match result {
        Ok(()) => info!("Script finished."),
        Err(PipelineError::Interrupted) => {
            warn!("Script terminated by user.");
            std::process::exit(EXIT_INTERRUPTED);
        }
        Err(e) => {
            report_error(&e);
            std::process::exit(1);
        }
    }
}

async fn cmd_job<J: Job>(
    job: J,
    args: JobArgs,
    env_file: Option<&Path>,
    default_input: &str,
    default_output: &str,
) -> Result<(), PipelineError> {
    info!("Loading environment variables...");
    config::load_env_file(env_file)?;
    let settings = AiSettings::from_env(Some(&args.model))?;

    let input = args.input.unwrap_or_else(|| PathBuf::from(default_input));
    let output = args.output.unwrap_or_else(|| PathBuf::from(default_output));
    info!("Input CSV: {}", input.display());
    info!("Output CSV: {}", output.display());
    info!("Using model: {}", settings.model);

    if !input.exists() {
        return Err(CsvError::NotFound(input).into());
    }

    let client = AiClient::new(settings)?;
    client
        .verify_model()
        .await
        .map_err(|source| PipelineError::ModelUnavailable {
            model: client.model().to_string(),
            source,
        })?;

    if let Some(n) = args.max_rows {
        info!("TEST MODE: Processing only {} rows.", n);
    }

    let options = RunOptions::new(input, output).with_max_rows(args.max_rows);
    let summary = tokio::select! {
        result = run_job(&job, &client, &options) => result?,
        _ = tokio::signal::ctrl_c() => {
            warn!(
                "Operation interrupted by user. Partial results might be in {}",
                options.partial_path().display()
            );
            return Err(PipelineError::Interrupted);
        }
    };

    eprintln!("\n📊 {}", job.name());
    eprintln!("   Encoding: {}", summary.encoding);
    eprintln!("   Delimiter: '{}'", format_delimiter(summary.delimiter));
    eprintln!("   Rows available: {}", summary.rows_available);
    if summary.rows_dropped > 0 {
        eprintln!("   Rows dropped: {}", summary.rows_dropped);
    }
    eprintln!("   Rows written: {}", summary.rows_written);
    eprintln!("   Elapsed: {:.1}s", summary.elapsed.as_secs_f64());
    eprintln!("💾 Output written to: {}", summary.output.display());

    Ok(())
}

fn cmd_peek(input: &Path, lines: usize) -> Result<(), PipelineError> {
    parser::peek(input, lines);

    let table = parser::read_table(input, BadLines::Truncate)?;
    eprintln!("📄 {}", input.display());
    eprintln!("   Encoding: {}", table.encoding);
    eprintln!("   Delimiter: '{}'", format_delimiter(table.delimiter));
    eprintln!("   Rows: {}", table.rows.len());
    eprintln!("   Columns:");
    for (i, col) in table.headers.iter().enumerate() {
        eprintln!("   [{:2}] {}", i + 1, col);
    }
    Ok(())
}

/// Log an error followed by any cause not already spelled out in its message.
fn report_error(err: &PipelineError) {
    let message = err.to_string();
    error!("Error: {}", message);

    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            error!("  caused by: {}", text);
        }
        source = cause.source();
    }
}
