// src/error.rs

use chrono::NaiveDate;
use thiserror::Error;

use crate::models::{RecordId, TimeOffStatus};

#[derive(Error, Debug)]
pub enum HrError {
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: RecordId },

    #[error("Mandatory field missing: {field} for {entity}")]
    ValidationMissing {
        entity: &'static str,
        field: &'static str,
    },

    #[error("Invalid clock time '{0}', expected HH:MM")]
    InvalidTime(String),

    #[error("Invalid date range: end {end} is before start {start}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("Date {0} is too close to the edge of the supported calendar")]
    DateOutOfRange(NaiveDate),

    #[error("{entity}.{field} references a record that does not exist: {reference}")]
    InvalidReference {
        entity: &'static str,
        field: &'static str,
        reference: String,
    },

    #[error("Duplicate {entity}: {key}")]
    Duplicate { entity: &'static str, key: String },

    #[error("Time-off request {id} cannot move from {from} to {to}")]
    TransitionNotAllowed {
        id: RecordId,
        from: TimeOffStatus,
        to: TimeOffStatus,
    },

    #[error("Remote API failure: Status={status:?}, Message='{message}'")]
    RemoteFailure { status: Option<u16>, message: String },

    // Raised only when nothing in the batch succeeded; partial successes are returned.
    #[error("Batch write failed: {failed} failed, {succeeded} succeeded")]
    PartialBatchFailure { failed: usize, succeeded: usize },

    #[error("HTTP request failed")]
    Request(#[from] reqwest::Error),

    #[error("JSON processing error")]
    Json(#[from] serde_json::Error),

    #[error("File I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    #[error("CSV export failed")]
    Csv(#[from] csv::Error),

    #[error("URL parsing error")]
    UrlParse(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, HrError>;

// Helper to create context-aware IO errors
pub(crate) fn io_context<E: Into<std::io::Error>, S: Into<String>>(
    source: E,
    context: S,
) -> HrError {
    HrError::Io {
        source: source.into(),
        context: context.into(),
    }
}

impl HrError {
    /// True for errors caused by the caller's input rather than the backend.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            HrError::NotFound { .. }
                | HrError::ValidationMissing { .. }
                | HrError::InvalidTime(_)
                | HrError::InvalidDateRange { .. }
                | HrError::DateOutOfRange(_)
                | HrError::InvalidReference { .. }
                | HrError::Duplicate { .. }
                | HrError::TransitionNotAllowed { .. }
        )
    }
}
