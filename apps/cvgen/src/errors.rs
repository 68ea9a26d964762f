use std::path::PathBuf;

use thiserror::Error;

use crate::llm_client::LlmError;
use crate::models::entry::DocType;

/// Application-level error type.
///
/// Fatal variants abort the run and map to a non-zero exit code via
/// [`AppError::exit_code`]. `MissingField` and `ScoringUnavailable` are
/// recoverable: callers log them, count them, and keep going.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Malformed store {}: {reason}", path.display())]
    MalformedStore { path: PathBuf, reason: String },

    #[error("Entry '{entry}' skipped: field '{field}' {reason}")]
    MissingField {
        entry: String,
        field: &'static str,
        reason: &'static str,
    },

    #[error("Scoring unavailable: {0}")]
    ScoringUnavailable(String),

    #[error("Export schema error: entry '{entry_id}' has no section")]
    ExportSchema { entry_id: String },

    #[error("No entry in the store is tagged '{0}'")]
    DocTypeAbsent(DocType),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        AppError::MalformedStore {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for errors a run survives (the affected item is skipped or
    /// falls back to unscored ranking).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::MissingField { .. } | AppError::ScoringUnavailable(_)
        )
    }

    /// Process exit code for a run that ended with this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::MalformedStore { .. } => 2,
            AppError::ExportSchema { .. } => 3,
            AppError::DocTypeAbsent(_) => 4,
            AppError::Config(_) => 5,
            AppError::Io(_) | AppError::Csv(_) => 6,
            AppError::MissingField { .. }
            | AppError::ScoringUnavailable(_)
            | AppError::Internal(_) => 1,
        }
    }
}

impl From<LlmError> for AppError {
    fn from(e: LlmError) -> Self {
        AppError::ScoringUnavailable(e.to_string())
    }
}
