//! Row-processing pipeline shared by every job.
//!
//! Reads the input table, lets the job prepare it, then walks the rows one
//! at a time: transform, pause for the API rate limit, checkpoint every few
//! rows into `<output>.partial`, and finally write `<output>`.
//!
//! # Example
//!
//! ```rust,ignore
//! use mugshot_charges::transform::{run_job, DisplayCrimeJob, RunOptions};
//!
//! let options = RunOptions::new("mugshot_ai_v1.csv", "mugshot_display_crimes.csv");
//! let summary = run_job(&DisplayCrimeJob, &client, &options).await?;
//! println!("{} rows written", summary.rows_written);
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::ai::ChatModel;
use crate::error::{CsvResult, PipelineError, PipelineResult};
use crate::logging::preview;
use crate::parser::{self, format_delimiter, BadLines, Quoting, Table};

/// Rows between two checkpoints
pub const CHECKPOINT_EVERY: usize = 10;

/// Suffix appended to the output path for checkpoints
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Lines shown by the input peek
const PEEK_LINES: usize = 5;

/// One input row with name-based access.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    /// 1-based position in processing order
    pub number: usize,
    headers: &'a [String],
    cells: &'a [String],
}

impl<'a> Row<'a> {
    pub fn new(number: usize, headers: &'a [String], cells: &'a [String]) -> Self {
        Self {
            number,
            headers,
            cells,
        }
    }

    /// Cell under `column`, empty when the column does not exist.
    pub fn get(&self, column: &str) -> &'a str {
        self.headers
            .iter()
            .position(|h| h == column)
            .and_then(|i| self.cells.get(i))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Value produced for one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowOutcome {
    /// Text for the appended column
    pub value: String,
    /// Whether to wait for the rate limit before the next row
    pub pause: bool,
}

impl RowOutcome {
    /// A value that cost an API call.
    pub fn called(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            pause: true,
        }
    }

    /// A value produced without touching the API.
    pub fn local(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            pause: false,
        }
    }
}

/// A batch job over CSV rows.
#[allow(async_fn_in_trait)]
pub trait Job {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Columns that must be present in the input header.
    fn required_columns(&self) -> &'static [&'static str];

    /// Header of the appended column.
    fn output_column(&self) -> &'static str;

    /// Wait after each row that called the API.
    fn rate_limit(&self) -> Duration;

    /// Handling of rows longer than the header.
    fn bad_lines(&self) -> BadLines {
        BadLines::Truncate
    }

    /// Output quoting.
    fn quoting(&self) -> Quoting {
        Quoting::Necessary
    }

    /// Reorder or filter rows before processing.
    fn prepare(&self, _table: &mut Table) -> CsvResult<()> {
        Ok(())
    }

    /// Produce the appended value for one row.
    async fn process_row<M: ChatModel>(&self, model: &M, row: Row<'_>) -> PipelineResult<RowOutcome>;
}

/// Options for one run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Input CSV
    pub input: PathBuf,
    /// Final output CSV
    pub output: PathBuf,
    /// Stop after this many rows
    pub max_rows: Option<usize>,
    /// Replace the job's rate-limit pause
    pub rate_limit: Option<Duration>,
    /// Rows between checkpoints
    pub checkpoint_every: usize,
}

impl RunOptions {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            max_rows: None,
            rate_limit: None,
            checkpoint_every: CHECKPOINT_EVERY,
        }
    }

    pub fn with_max_rows(mut self, max_rows: Option<usize>) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn with_rate_limit(mut self, pause: Duration) -> Self {
        self.rate_limit = Some(pause);
        self
    }

    /// `<output>.partial`
    pub fn partial_path(&self) -> PathBuf {
        partial_path(&self.output)
    }
}

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub output: PathBuf,
    pub encoding: String,
    pub delimiter: char,
    /// Rows in the input after preparation
    pub rows_available: usize,
    /// Rows written to the output
    pub rows_written: usize,
    /// Rows dropped while reading or preparing
    pub rows_dropped: usize,
    pub elapsed: Duration,
}

/// `<output>.partial` for a given output path.
pub fn partial_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Run `job` over the input file, calling `model` for each row that needs it.
pub async fn run_job<J: Job, M: ChatModel>(
    job: &J,
    model: &M,
    options: &RunOptions,
) -> PipelineResult<RunSummary> {
    let started = Instant::now();
    info!("Starting {} from: {}", job.name(), options.input.display());
    info!("Will save results to: {}", options.output.display());

    ensure_parent_dir(&options.output)?;
    parser::peek(&options.input, PEEK_LINES);

    let mut table = parser::read_table(&options.input, job.bad_lines())?;
    info!("CSV header found: {}", table.headers.join(", "));
    info!(
        "Read {} rows (encoding {}, delimiter '{}')",
        table.rows.len(),
        table.encoding,
        format_delimiter(table.delimiter)
    );

    for column in job.required_columns() {
        table.require_column(column)?;
        info!("'{}' column found in CSV.", column);
    }

    let rows_read = table.rows.len();
    job.prepare(&mut table)?;
    let rows_dropped = table.skipped + (rows_read - table.rows.len());
    let rows_available = table.rows.len();

    let limit = match options.max_rows {
        Some(max) => {
            info!("Processing a maximum of {} rows.", max);
            max.min(rows_available)
        }
        None => {
            info!("Processing all {} rows.", rows_available);
            rows_available
        }
    };

    let mut headers = table.headers.clone();
    headers.push(job.output_column().to_string());

    let pause = options.rate_limit.unwrap_or_else(|| job.rate_limit());
    let partial = options.partial_path();
    let mut processed: Vec<Vec<String>> = Vec::with_capacity(limit);

    for (idx, cells) in table.rows.iter().take(limit).enumerate() {
        let number = idx + 1;
        let row_started = Instant::now();
        info!("Processing row {}/{}...", number, limit);

        let row = Row::new(number, &table.headers, cells);
        let outcome = match job.process_row(model, row).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Row {} failed, aborting run: {}", number, e);
                return Err(PipelineError::Row {
                    row: number,
                    source: Box::new(e),
                });
            }
        };

        info!(
            "Row {} completed in {:.2} seconds. {}: {}",
            number,
            row_started.elapsed().as_secs_f64(),
            job.output_column(),
            preview(&outcome.value, 100)
        );

        let mut out = cells.clone();
        out.push(outcome.value);
        processed.push(out);

        if outcome.pause && !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }

        if options.checkpoint_every > 0 && number % options.checkpoint_every == 0 {
            checkpoint(&partial, &headers, &processed, job.quoting());
        }
    }

    info!("Processing complete. Writing final results to {}...", options.output.display());
    parser::write_table(&options.output, &headers, &processed, job.quoting())?;
    info!("Successfully saved {} rows to {}", processed.len(), options.output.display());

    if partial.exists() {
        match fs::remove_file(&partial) {
            Ok(()) => info!("Removed partial file: {}", partial.display()),
            Err(e) => warn!("Could not remove partial file {}: {}", partial.display(), e),
        }
    }

    Ok(RunSummary {
        output: options.output.clone(),
        encoding: table.encoding,
        delimiter: table.delimiter,
        rows_available,
        rows_written: processed.len(),
        rows_dropped,
        elapsed: started.elapsed(),
    })
}

/// Save progress so far; failures are logged and the run continues.
fn checkpoint(path: &Path, headers: &[String], rows: &[Vec<String>], quoting: Quoting) {
    info!("Saving intermediate results to {}...", path.display());
    match parser::write_table(path, headers, rows, quoting) {
        Ok(()) => info!("Intermediate results saved ({} rows)", rows.len()),
        Err(e) => warn!("Error saving intermediate results: {}", e),
    }
}

/// Create the output's parent directory when missing.
fn ensure_parent_dir(output: &Path) -> PipelineResult<()> {
    match output.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.exists() => {
            fs::create_dir_all(dir).map_err(|source| PipelineError::OutputDir {
                path: dir.to_path_buf(),
                source,
            })?;
            info!("Created output directory: {}", dir.display());
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::ChatRequest;
    use crate::error::{AiError, AiResult, CsvError};

    struct NoModel;

    impl ChatModel for NoModel {
        async fn complete(&self, _request: &ChatRequest) -> AiResult<String> {
            Err(AiError::EmptyResponse)
        }
    }

    /// Upper-cases the `name` column; fails on the row whose name is `boom`.
    struct Shout;

    impl Job for Shout {
        fn name(&self) -> &'static str {
            "shout"
        }
        fn required_columns(&self) -> &'static [&'static str] {
            &["name"]
        }
        fn output_column(&self) -> &'static str {
            "Shout"
        }
        fn rate_limit(&self) -> Duration {
            Duration::from_secs(60)
        }
        async fn process_row<M: ChatModel>(&self, _model: &M, row: Row<'_>) -> PipelineResult<RowOutcome> {
            match row.get("name") {
                "boom" => Err(CsvError::MissingColumn("boom".into()).into()),
                name => Ok(RowOutcome::local(name.to_uppercase())),
            }
        }
    }

    fn write_input(dir: &Path, names: &[&str]) -> PathBuf {
        let path = dir.join("in.csv");
        let mut body = String::from("id;name\n");
        for (i, n) in names.iter().enumerate() {
            body.push_str(&format!("{};{}\n", i + 1, n));
        }
        fs::write(&path, body).unwrap();
        path
    }

    #[tokio::test]
    async fn test_appends_column_and_removes_partial() {
        let dir = tempfile::tempdir().unwrap();
        let names: Vec<String> = (0..12).map(|i| format!("n{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let input = write_input(dir.path(), &refs);
        let output = dir.path().join("nested/out.csv");

        let options = RunOptions::new(&input, &output);
        let summary = run_job(&Shout, &NoModel, &options).await.unwrap();

        assert_eq!(summary.rows_written, 12);
        assert_eq!(summary.delimiter, ';');
        assert!(!options.partial_path().exists());

        let table = parser::read_table(&output, BadLines::Truncate).unwrap();
        assert_eq!(table.headers, vec!["id", "name", "Shout"]);
        assert_eq!(table.rows[11], vec!["12", "n11", "N11"]);
    }

    #[tokio::test]
    async fn test_max_rows_limits_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), &["a", "b", "c"]);
        let output = dir.path().join("out.csv");

        let options = RunOptions::new(&input, &output).with_max_rows(Some(2));
        let summary = run_job(&Shout, &NoModel, &options).await.unwrap();
        assert_eq!(summary.rows_written, 2);
        assert_eq!(summary.rows_available, 3);
    }

    #[tokio::test]
    async fn test_row_error_aborts_and_keeps_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let mut names = vec!["ok"; 10];
        names.push("boom");
        let input = write_input(dir.path(), &names);
        let output = dir.path().join("out.csv");

        let options = RunOptions::new(&input, &output);
        let err = run_job(&Shout, &NoModel, &options).await.unwrap_err();
        assert!(matches!(err, PipelineError::Row { row: 11, .. }));
        assert!(!output.exists());

        let partial = parser::read_table(&options.partial_path(), BadLines::Truncate).unwrap();
        assert_eq!(partial.rows.len(), 10);
        assert_eq!(partial.rows[0][2], "OK");
    }

    #[tokio::test]
    async fn test_checkpoint_failure_does_not_stop_run() {
        let dir = tempfile::tempdir().unwrap();
        let names = vec!["ok"; 12];
        let input = write_input(dir.path(), &names);
        let output = dir.path().join("out.csv");

        let options = RunOptions::new(&input, &output);
        // A directory in the way makes every checkpoint write fail.
        fs::create_dir(options.partial_path()).unwrap();

        let summary = run_job(&Shout, &NoModel, &options).await.unwrap();
        assert_eq!(summary.rows_written, 12);
        assert!(options.partial_path().is_dir());

        let table = parser::read_table(&output, BadLines::Truncate).unwrap();
        assert_eq!(table.rows.len(), 12);
        assert_eq!(table.rows[11][2], "OK");
    }

    #[tokio::test]
    async fn test_local_rows_skip_rate_limit() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), &["a", "b", "c"]);
        let output = dir.path().join("out.csv");

        // Shout waits a minute after API rows but only produces local ones.
        let options = RunOptions::new(&input, &output);
        let run = run_job(&Shout, &NoModel, &options);
        let summary = tokio::time::timeout(Duration::from_secs(10), run)
            .await
            .expect("local rows must not wait for the rate limit")
            .unwrap();
        assert_eq!(summary.rows_written, 3);
        assert!(summary.elapsed < Shout.rate_limit());
    }

    #[tokio::test]
    async fn test_missing_required_column() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        fs::write(&input, "id,title\n1,x\n").unwrap();

        let options = RunOptions::new(&input, dir.path().join("out.csv"));
        let err = run_job(&Shout, &NoModel, &options).await.unwrap_err();
        assert!(matches!(err, PipelineError::Csv(CsvError::MissingColumn(ref c)) if c == "name"));
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("out/result.csv")),
            PathBuf::from("out/result.csv.partial")
        );
    }

    #[test]
    fn test_row_get_unknown_column_is_empty() {
        let headers = vec!["a".to_string()];
        let cells = vec!["1".to_string()];
        let row = Row::new(1, &headers, &cells);
        assert_eq!(row.get("a"), "1");
        assert_eq!(row.get("b"), "");
    }
}
