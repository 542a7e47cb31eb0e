//! # Mugshot charges - LLM-assisted charge selection for mugshot CSVs
//!
//! Reads scraped inmate records, asks a chat-completion model to pick (and
//! optionally reword) one charge out of a pipe-separated list per row, and
//! writes the input back out with one extra column.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Parser    │────▶│  Row loop   │────▶│  CSV File   │
//! │  (any enc.) │     │  (auto-enc) │     │  (LLM call) │     │ (+1 column) │
//! └─────────────┘     └─────────────┘     └──────┬──────┘     └─────────────┘
//!                                                │ every 10 rows
//!                                                ▼
//!                                         <output>.partial
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mugshot_charges::{AiClient, AiSettings, DisplayCrimeJob, RunOptions, run_job};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = AiClient::new(AiSettings::from_env(None)?)?;
//!     let options = RunOptions::new("mugshot_ai_v1.csv", "mugshot_display_crimes.csv");
//!     let summary = run_job(&DisplayCrimeJob, &client, &options).await?;
//!     println!("Wrote {} rows", summary.rows_written);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`config`] - Environment and `.env` loading
//! - [`logging`] - Timestamped log output
//! - [`models`] - Charges, selections, placeholder texts
//! - [`parser`] - CSV reading/writing with auto-detection
//! - [`ai`] - Chat-completion client and prompts
//! - [`transform`] - Selection, row pipeline, jobs

// Core modules
pub mod config;
pub mod error;
pub mod logging;
pub mod models;

// Parsing
pub mod parser;

// AI
pub mod ai;

// Transformation
pub mod transform;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{AiError, ConfigError, CsvError, PipelineError};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{placeholder, Charges, FallbackReason, Selection};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, parse_bytes, read_table, write_table,
    BadLines, Quoting, Table,
};

// =============================================================================
// Re-exports - AI Client
// =============================================================================

pub use ai::{AiClient, ChatModel, ChatRequest};
pub use config::AiSettings;

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::{
    resolve_answer, reword, run_job, ChargeSelector, DisplayCrimeJob, Job, PlainChargeJob,
    RunOptions, RunSummary,
};
