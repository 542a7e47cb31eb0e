//! Error types for the charge processing pipeline.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`CsvError`] - CSV reading/writing errors
//! - [`AiError`] - chat-completion client errors
//! - [`ConfigError`] - missing or malformed configuration
//! - [`PipelineError`] - Top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use std::path::PathBuf;

use thiserror::Error;

// =============================================================================
// CSV Errors
// =============================================================================

/// Errors while reading or writing CSV files.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Input file does not exist.
    #[error("Input file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Failed to read or write a file.
    #[error("Failed to access file: {0}")]
    IoError(#[from] std::io::Error),

    /// Empty file.
    #[error("CSV file is empty")]
    EmptyFile,

    /// No headers found.
    #[error("No headers found in CSV")]
    NoHeaders,

    /// A column the job depends on is absent from the header.
    #[error("Required column '{0}' not found in CSV header")]
    MissingColumn(String),

    /// Malformed CSV content.
    #[error("Invalid CSV format: {0}")]
    ParseError(#[from] csv::Error),
}

// =============================================================================
// AI Client Errors
// =============================================================================

/// Errors from the chat-completion client.
#[derive(Debug, Error)]
pub enum AiError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    /// Request timed out.
    #[error("Request timed out")]
    Timeout,

    /// The API answered with an error status.
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    /// The response body could not be decoded.
    #[error("Invalid JSON response: {0}")]
    InvalidJson(String),

    /// The response carried no text.
    #[error("Empty response")]
    EmptyResponse,

    /// Every retry failed; wraps the last failure.
    #[error("API call failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<AiError> },
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AiError::Timeout
        } else {
            AiError::RequestFailed(err.to_string())
        }
    }
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable is unset or empty.
    #[error("Missing {0} in .env file or environment variables")]
    MissingVar(&'static str),

    /// An explicit `.env` path could not be loaded.
    #[error("Failed to load env file {}: {source}", .path.display())]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the main error type returned by [`crate::transform::pipeline::run_job`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// CSV error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// AI client error that could not be turned into a fallback.
    #[error("AI error: {0}")]
    Ai(#[from] AiError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The configured model is not reachable with the current credentials.
    #[error("Could not access model '{model}': {source}")]
    ModelUnavailable {
        model: String,
        #[source]
        source: AiError,
    },

    /// Could not create the output directory.
    #[error("Failed to create output directory {}: {source}", .path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A row failed in a way that aborts the run.
    #[error("Row {row} failed: {source}")]
    Row {
        row: usize,
        #[source]
        source: Box<PipelineError>,
    },

    /// The run was stopped with Ctrl-C.
    #[error("Interrupted by user")]
    Interrupted,
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for AI operations.
pub type AiResult<T> = Result<T, AiError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let csv_err = CsvError::EmptyFile;
        let pipeline_err: PipelineError = csv_err.into();
        assert!(pipeline_err.to_string().contains("empty"));

        let csv_err = CsvError::MissingColumn("InmateID".into());
        let pipeline_err: PipelineError = csv_err.into();
        assert!(pipeline_err.to_string().contains("InmateID"));
    }

    #[test]
    fn test_retries_exhausted_keeps_last_error() {
        let err = AiError::RetriesExhausted {
            attempts: 3,
            last: Box::new(AiError::ApiError {
                status: 429,
                message: "Rate limit reached".into(),
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("3 attempts"));
        assert!(msg.contains("Rate limit reached"));
    }

    #[test]
    fn test_model_unavailable_exposes_source() {
        use std::error::Error as _;

        let err = PipelineError::ModelUnavailable {
            model: "gpt-4.1-mini".into(),
            source: AiError::Timeout,
        };
        assert!(err.to_string().contains("gpt-4.1-mini"));
        assert_eq!(err.source().map(|s| s.to_string()), Some("Request timed out".into()));
    }
}
