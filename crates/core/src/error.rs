//! Error types for rolodex operations.
//!
//! This module defines the main error type [`ScrapeError`], which covers every
//! fatal failure of a pipeline run, and [`ExtractionError`], which describes
//! recoverable per-card conditions that are reported but never abort a run.
//!
//! # Example
//!
//! ```rust
//! use rolodex_core::{ScrapeError, Stage};
//!
//! let err = ScrapeError::Parse("input is empty".to_string());
//! assert_eq!(err.stage(), Stage::Parse);
//! ```

use thiserror::Error;

use crate::fetch::FetchFailure;

/// Main error type for a pipeline run.
///
/// Variants are grouped by [`Stage`] so a caller can tell "couldn't get data"
/// (fetch, parse) apart from "got data but couldn't save it" (output).
#[derive(Error, Debug)]
pub enum ScrapeError {
    /// The page could not be retrieved.
    ///
    /// Wraps the fetcher's classified failure, including the number of
    /// attempts that were made before giving up.
    #[error("Failed to fetch page: {0}")]
    Fetch(#[from] FetchFailure),

    /// The response body could not be turned into a document.
    ///
    /// Only raised for empty or binary input; malformed markup is repaired
    /// by the HTML parser instead.
    #[error("Failed to parse HTML: {0}")]
    Parse(String),

    /// A configured CSS selector does not compile.
    #[error("Invalid selector for field '{field}' ({selector}): {reason}")]
    InvalidSelector { field: String, selector: String, reason: String },

    /// Selector or fetch configuration is inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Records could not be delivered to the sink.
    #[error("Failed to write output: {0}")]
    Output(String),

    /// File write errors.
    #[error("Failed to write to file: {0}")]
    Io(#[from] std::io::Error),

    /// CSV serialization errors.
    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization errors.
    #[error("Failed to write JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// The pipeline stage an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Fetch,
    Parse,
    Output,
}

impl Stage {
    /// Process exit code for a run that failed in this stage.
    pub fn exit_code(self) -> u8 {
        match self {
            Stage::Fetch | Stage::Parse => 1,
            Stage::Config => 2,
            Stage::Output => 3,
        }
    }
}

impl ScrapeError {
    /// Classifies the error by the stage that produced it.
    pub fn stage(&self) -> Stage {
        match self {
            ScrapeError::InvalidSelector { .. } | ScrapeError::Config(_) => Stage::Config,
            ScrapeError::Fetch(_) => Stage::Fetch,
            ScrapeError::Parse(_) => Stage::Parse,
            ScrapeError::Output(_) | ScrapeError::Io(_) | ScrapeError::Csv(_) | ScrapeError::Json(_) => {
                Stage::Output
            }
        }
    }
}

/// Non-fatal condition found while extracting cards.
///
/// These are collected into [`RunResult::errors`](crate::RunResult) in the
/// order they were found.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// The card selector matched nothing in the document.
    #[error("No cards matched selector '{selector}'")]
    NoCardsFound { selector: String },

    /// A card had too few non-empty fields and was skipped.
    #[error("Card #{index} skipped: {filled} of {required} required fields filled")]
    EmptyCard { index: usize, filled: usize, required: usize },
}

/// Result type alias for ScrapeError.
pub type Result<T> = std::result::Result<T, ScrapeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FailureKind;

    #[test]
    fn test_error_display() {
        let err = ScrapeError::Parse("input is empty".to_string());
        assert!(err.to_string().contains("Failed to parse HTML"));
    }

    #[test]
    fn test_invalid_selector_display() {
        let err = ScrapeError::InvalidSelector {
            field: "email".to_string(),
            selector: "[[".to_string(),
            reason: "unexpected token".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("email"));
        assert!(msg.contains("[["));
    }

    #[test]
    fn test_stage_classification() {
        let fetch = ScrapeError::Fetch(FetchFailure::new(FailureKind::Timeout, "slow", 3));
        assert_eq!(fetch.stage(), Stage::Fetch);
        assert_eq!(ScrapeError::Parse(String::new()).stage(), Stage::Parse);
        assert_eq!(ScrapeError::Config(String::new()).stage(), Stage::Config);

        let io = ScrapeError::from(std::io::Error::other("disk full"));
        assert_eq!(io.stage(), Stage::Output);
    }

    #[test]
    fn test_exit_codes_are_distinct_per_stage() {
        assert_eq!(Stage::Fetch.exit_code(), 1);
        assert_eq!(Stage::Parse.exit_code(), 1);
        assert_eq!(Stage::Config.exit_code(), 2);
        assert_eq!(Stage::Output.exit_code(), 3);
    }

    #[test]
    fn test_empty_card_display() {
        let err = ExtractionError::EmptyCard { index: 4, filled: 0, required: 1 };
        assert!(err.to_string().contains("#4"));
    }
}
