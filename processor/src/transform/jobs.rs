//! The two batch jobs.
//!
//! - [`DisplayCrimeJob`] picks the most dramatic of the already summarized
//!   charges in `AI_Description_Explanation`.
//! - [`PlainChargeJob`] sorts inmates by id, picks the most interesting raw
//!   charge in `Description` and rewrites it in plain English.

use std::time::Duration;

use tracing::{info, warn};

use super::pipeline::{Job, Row, RowOutcome};
use super::selection::ChargeSelector;
use crate::ai::{prompt, ChatModel};
use crate::error::{CsvResult, PipelineResult};
use crate::logging::preview;
use crate::models::{placeholder, FallbackReason, Selection};
use crate::parser::{BadLines, Quoting, Table};

// =============================================================================
// Display crime
// =============================================================================

/// Column holding pipe-separated summarized charges
pub const EXPLANATION_COLUMN: &str = "AI_Description_Explanation";

/// Column appended by [`DisplayCrimeJob`]
pub const DISPLAY_CRIME_COLUMN: &str = "Display_Crime";

/// Picks the charge most worth showing on a mugshot card.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisplayCrimeJob;

impl DisplayCrimeJob {
    pub const DEFAULT_INPUT: &'static str = "mugshot_ai_v1.csv";
    pub const DEFAULT_OUTPUT: &'static str = "mugshot_display_crimes.csv";
}

impl Job for DisplayCrimeJob {
    fn name(&self) -> &'static str {
        "display crime processing"
    }

    fn required_columns(&self) -> &'static [&'static str] {
        &[EXPLANATION_COLUMN]
    }

    fn output_column(&self) -> &'static str {
        DISPLAY_CRIME_COLUMN
    }

    fn rate_limit(&self) -> Duration {
        Duration::from_millis(500)
    }

    async fn process_row<M: ChatModel>(&self, model: &M, row: Row<'_>) -> PipelineResult<RowOutcome> {
        let explanations = row.get(EXPLANATION_COLUMN);
        info!("Row {} '{}': {}", row.number, EXPLANATION_COLUMN, preview(explanations, 70));

        if explanations.trim().is_empty() {
            info!("  No '{}' found for this row, or it is empty.", EXPLANATION_COLUMN);
            return Ok(RowOutcome::local(placeholder::NO_AI_EXPLANATION));
        }

        let selection = ChargeSelector::EXCITING.select(model, explanations).await;
        // Pause only after the model actually answered.
        let called = matches!(
            selection,
            Selection::Picked(_)
                | Selection::Matched(_)
                | Selection::Fallback {
                    reason: FallbackReason::UnknownAnswer(_),
                    ..
                }
        );
        let value = selection.into_text();

        Ok(if called {
            RowOutcome::called(value)
        } else {
            RowOutcome::local(value)
        })
    }
}

// =============================================================================
// Plain-English interesting charge
// =============================================================================

/// Column holding the inmate id used for sorting
pub const INMATE_ID_COLUMN: &str = "InmateID";

/// Column holding pipe-separated raw charges
pub const DESCRIPTION_COLUMN: &str = "Description";

/// Optional column shown in progress logs
pub const NAME_COLUMN: &str = "Name";

/// Column appended by [`PlainChargeJob`]
pub const PLAIN_CHARGE_COLUMN: &str = "Interesting_Charge_Plain_English";

/// Picks the most interesting raw charge and rewords it for a general audience.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainChargeJob;

impl PlainChargeJob {
    pub const DEFAULT_INPUT: &'static str = "mugshots_data.csv";
    pub const DEFAULT_OUTPUT: &'static str = "processed_inmate_charges.csv";
}

impl Job for PlainChargeJob {
    fn name(&self) -> &'static str {
        "inmate charge processing"
    }

    fn required_columns(&self) -> &'static [&'static str] {
        &[INMATE_ID_COLUMN, DESCRIPTION_COLUMN]
    }

    fn output_column(&self) -> &'static str {
        PLAIN_CHARGE_COLUMN
    }

    fn rate_limit(&self) -> Duration {
        Duration::from_millis(1500)
    }

    fn bad_lines(&self) -> BadLines {
        BadLines::Skip
    }

    fn quoting(&self) -> Quoting {
        Quoting::Always
    }

    /// Drop rows without a numeric id, normalize ids, sort ascending.
    fn prepare(&self, table: &mut Table) -> CsvResult<()> {
        let id_col = table.require_column(INMATE_ID_COLUMN)?;
        info!("Sorting data by '{}'...", INMATE_ID_COLUMN);

        let before = table.rows.len();
        let mut keyed: Vec<(i64, Vec<String>)> = table
            .rows
            .drain(..)
            .filter_map(|mut row| {
                let id = parse_inmate_id(&row[id_col])?;
                row[id_col] = id.to_string();
                Some((id, row))
            })
            .collect();

        let dropped = before - keyed.len();
        if dropped > 0 {
            warn!("Dropped {} rows with a non-numeric '{}'", dropped, INMATE_ID_COLUMN);
        }

        keyed.sort_by_key(|(id, _)| *id);
        table.rows = keyed.into_iter().map(|(_, row)| row).collect();
        info!("Data sorted successfully.");
        Ok(())
    }

    async fn process_row<M: ChatModel>(&self, model: &M, row: Row<'_>) -> PipelineResult<RowOutcome> {
        let id = row.get(INMATE_ID_COLUMN);
        let name = match row.get(NAME_COLUMN) {
            "" => "N/A",
            n => n,
        };
        info!("Processing inmate {}, ID: {}, Name: {}", row.number, id, name);

        let raw_charges = row.get(DESCRIPTION_COLUMN);
        if raw_charges.trim().is_empty() {
            info!("  No raw charges found for this inmate. Skipping AI processing.");
            return Ok(RowOutcome::local(placeholder::NO_RAW_CHARGES_LISTED));
        }

        info!("  Identifying most interesting charge from: \"{}\"", preview(raw_charges, 100));
        let selection = ChargeSelector::INTERESTING.select(model, raw_charges).await;
        info!("  Identified raw interesting charge: \"{}\"", selection.text());

        let plain = reword(model, &selection).await;
        info!("  Reworded to plain English: \"{}\"", plain);

        Ok(RowOutcome::called(plain))
    }
}

/// Rewrite a selected charge in plain English.
///
/// Placeholders are never sent to the model. A failed call yields the fixed
/// error text rather than an error so the run can go on.
pub async fn reword<M: ChatModel>(model: &M, selection: &Selection) -> String {
    let charge = selection.text();
    if !selection.is_charge() || charge.trim().is_empty() || charge.starts_with("Error:") {
        return placeholder::CANNOT_REWORD.to_string();
    }

    match model.complete(&prompt::reword_charge(charge)).await {
        Ok(text) => text,
        Err(e) => {
            warn!("Reword failed for '{}': {}", charge, e);
            placeholder::REWORD_FAILED.to_string()
        }
    }
}

/// Numeric id in integer form: `"12"`, `" 12.0 "` and `"1.2e1"` all give 12.
pub fn parse_inmate_id(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(id) = raw.parse::<i64>() {
        return Some(id);
    }

    let value = raw.parse::<f64>().ok().filter(|v| v.is_finite())?;
    if value.abs() >= i64::MAX as f64 {
        return None;
    }
    Some(value.trunc() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::ChatRequest;
    use crate::error::{AiError, AiResult};
    use crate::parser::{self, read_table};
    use crate::transform::pipeline::{run_job, RunOptions};
    use std::cell::RefCell;
    use std::fs;

    /// Answers by prompt kind and keeps a log of every request.
    #[derive(Default)]
    struct FakeModel {
        fail_reword: bool,
        seen: RefCell<Vec<ChatRequest>>,
    }

    impl ChatModel for FakeModel {
        async fn complete(&self, request: &ChatRequest) -> AiResult<String> {
            self.seen.borrow_mut().push(request.clone());

            if request.user.starts_with("Rewrite") {
                if self.fail_reword {
                    return Err(AiError::Timeout);
                }
                return Ok(format!("plain: {}", request.user.len()));
            }

            // Pick the last listed candidate.
            let last = request
                .user
                .lines()
                .filter(|l| l.chars().next().is_some_and(|c| c.is_ascii_digit()))
                .last()
                .unwrap_or_default();
            Ok(last.to_string())
        }
    }

    /// Every call fails.
    struct Unreachable;

    impl ChatModel for Unreachable {
        async fn complete(&self, _request: &ChatRequest) -> AiResult<String> {
            Err(AiError::RetriesExhausted {
                attempts: 3,
                last: Box::new(AiError::Timeout),
            })
        }
    }

    #[test]
    fn test_parse_inmate_id() {
        assert_eq!(parse_inmate_id("42"), Some(42));
        assert_eq!(parse_inmate_id(" 12.0 "), Some(12));
        assert_eq!(parse_inmate_id("1.2e1"), Some(12));
        assert_eq!(parse_inmate_id("N/A"), None);
        assert_eq!(parse_inmate_id(""), None);
        assert_eq!(parse_inmate_id("NaN"), None);
    }

    #[test]
    fn test_prepare_sorts_and_drops() {
        let csv = "InmateID,Name,Description\n30,C,x\nabc,Bad,y\n4.0,A,z\n12,B,w\n";
        let mut table = parser::parse_bytes(csv.as_bytes(), BadLines::Skip).unwrap();
        PlainChargeJob.prepare(&mut table).unwrap();

        let ids: Vec<&str> = table.rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(ids, vec!["4", "12", "30"]);
    }

    #[tokio::test]
    async fn test_reword_skips_placeholders() {
        let model = FakeModel::default();
        let text = reword(&model, &Selection::Empty(placeholder::NO_VALID_CHARGES)).await;
        assert_eq!(text, placeholder::CANNOT_REWORD);
        assert!(model.seen.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_reword_failure_text() {
        let model = FakeModel {
            fail_reword: true,
            ..Default::default()
        };
        let text = reword(&model, &Selection::Single("PETIT THEFT".into())).await;
        assert_eq!(text, placeholder::REWORD_FAILED);
    }

    #[tokio::test]
    async fn test_display_pause_follows_model_answer() {
        let headers = vec![EXPLANATION_COLUMN.to_string()];
        let cells = vec!["Stole a bike | Set a barn on fire".to_string()];

        let failed = DisplayCrimeJob
            .process_row(&Unreachable, Row::new(1, &headers, &cells))
            .await
            .unwrap();
        assert_eq!(failed.value, "Stole a bike");
        assert!(!failed.pause);

        let answered = DisplayCrimeJob
            .process_row(&FakeModel::default(), Row::new(1, &headers, &cells))
            .await
            .unwrap();
        assert_eq!(answered.value, "Set a barn on fire");
        assert!(answered.pause);
    }

    #[tokio::test]
    async fn test_plain_job_limits_rows_after_sorting() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("mugshots_data.csv");
        fs::write(
            &input,
            "InmateID,Name,Description\n\
             30,Last,DUI\n\
             7,First,PETIT THEFT\n\
             12,Middle,BATTERY\n",
        )
        .unwrap();
        let output = dir.path().join("processed.csv");

        let options = RunOptions::new(&input, &output)
            .with_max_rows(Some(1))
            .with_rate_limit(Duration::ZERO);
        let summary = run_job(&PlainChargeJob, &FakeModel::default(), &options)
            .await
            .unwrap();
        assert_eq!(summary.rows_written, 1);
        assert_eq!(summary.rows_available, 3);

        let table = read_table(&output, BadLines::Truncate).unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0][0], "7");
        assert_eq!(table.rows[0][1], "First");
    }

    #[tokio::test]
    async fn test_display_job_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("mugshot_ai_v1.csv");
        fs::write(
            &input,
            "Name;AI_Description_Explanation\n\
             Doe;Stole a bike | Set a barn on fire\n\
             Roe;\n\
             Poe;Drove drunk\n",
        )
        .unwrap();
        let output = dir.path().join("display.csv");

        let model = FakeModel::default();
        let options = RunOptions::new(&input, &output).with_rate_limit(Duration::ZERO);
        run_job(&DisplayCrimeJob, &model, &options).await.unwrap();

        let table = read_table(&output, BadLines::Truncate).unwrap();
        assert_eq!(table.headers.last().unwrap(), DISPLAY_CRIME_COLUMN);
        let column: Vec<&str> = table.rows.iter().map(|r| r[2].as_str()).collect();
        assert_eq!(
            column,
            vec!["Set a barn on fire", placeholder::NO_AI_EXPLANATION, "Drove drunk"]
        );
        // Only the two-charge row reached the model.
        assert_eq!(model.seen.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_plain_job_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("mugshots_data.csv");
        fs::write(
            &input,
            "InmateID,Name,Description\n\
             9,Late,BATTERY|ARSON\n\
             x,Broken,DUI\n\
             2,Early,\n",
        )
        .unwrap();
        let output = dir.path().join("out/processed.csv");

        let model = FakeModel::default();
        let options = RunOptions::new(&input, &output).with_rate_limit(Duration::ZERO);
        let summary = run_job(&PlainChargeJob, &model, &options).await.unwrap();
        assert_eq!(summary.rows_written, 2);
        assert_eq!(summary.rows_dropped, 1);

        let text = fs::read_to_string(&output).unwrap();
        assert!(text.starts_with("\"InmateID\",\"Name\",\"Description\",\"Interesting_Charge_Plain_English\""));

        let table = read_table(&output, BadLines::Truncate).unwrap();
        assert_eq!(table.rows[0][0], "2");
        assert_eq!(table.rows[0][3], placeholder::NO_RAW_CHARGES_LISTED);
        assert_eq!(table.rows[1][0], "9");
        assert!(table.rows[1][3].starts_with("plain: "));

        let seen = model.seen.borrow();
        assert_eq!(seen.len(), 2);
        assert!(seen[1].user.contains("{ARSON}"));
    }
}
