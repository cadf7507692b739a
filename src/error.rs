use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("Invalid date \"{input}\" (expected YYYYMMDD or YYYY-MM-DD)")]
    InvalidDate { input: String },

    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("Unknown filter \"{name}\" (expected one of: {known})")]
    UnknownFilter { name: String, known: String },

    #[error("Duplicate report row for {key}")]
    Assembly { key: String },

    #[error("Metric {metric} is not additive and cannot be summed across periods")]
    NonAdditiveMetric { metric: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to load identifiers: {0}")]
    Identifiers(String),

    #[error("{0}")]
    Fetch(#[from] FetchError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure of a single API call. The run loop logs these and moves on.
#[derive(Debug, Error)]
pub(crate) enum FetchError {
    #[error("API returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Malformed API response: {0}")]
    Decode(String),

    #[error("Authentication failed: {0}")]
    Auth(String),
}

impl FetchError {
    /// Rate limiting, server-side hiccups and network trouble are worth another attempt.
    pub(crate) fn is_transient(&self) -> bool {
        match self {
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Transport(_) => true,
            FetchError::Decode(_) | FetchError::Auth(_) => false,
        }
    }
}

impl From<ureq::Error> for FetchError {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::StatusCode(status) => FetchError::Status {
                status,
                message: String::new(),
            },
            ureq::Error::Json(e) => FetchError::Decode(e.to_string()),
            other => FetchError::Transport(other.to_string()),
        }
    }
}
