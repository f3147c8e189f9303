//! Error taxonomy shared by the configuration, parsing and alignment layers.

use thiserror::Error;

/// Errors raised by the HTTP transport wrappers in [`crate::fetch`].
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network or protocol failure reported by reqwest
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-2xx status
    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The URL could not be parsed
    #[error("invalid URL: {0}")]
    Url(String),

    /// A configured header name or value is not valid HTTP
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// All retry attempts failed; carries the last failure
    #[error("giving up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: usize,
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// Whether a later attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport(_) => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Url(_)
            | FetchError::InvalidHeader(_)
            | FetchError::RetriesExhausted { .. } => false,
        }
    }
}

/// Errors that abort a comparison run.
#[derive(Debug, Error)]
pub enum RaterError {
    #[error("location not supported: {0}")]
    UnsupportedLocation(String),

    #[error("model not supported: {0}")]
    UnsupportedModel(String),

    #[error("unknown numeric model id: {0}")]
    UnknownModelId(u8),

    #[error("station not supported: {0}")]
    UnsupportedStation(String),

    #[error("tide gauge not supported: {0}")]
    UnsupportedTideGauge(String),

    /// Any other invalid setting (zero window, negative bound, duplicates)
    #[error("configuration error: {0}")]
    Config(String),

    /// The vendor payload is missing fields or records are incomplete
    #[error("malformed {vendor} payload: {reason}")]
    MalformedPayload { vendor: &'static str, reason: String },

    #[error("unsupported grid interval of {0}s, expected 900s")]
    UnsupportedInterval(i64),

    /// A series cannot be placed on the run grid without shifting data
    #[error("grid mismatch for {series}: {reason}")]
    GridMismatch { series: String, reason: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RaterError {
    pub(crate) fn malformed(vendor: &'static str, reason: impl Into<String>) -> Self {
        RaterError::MalformedPayload {
            vendor,
            reason: reason.into(),
        }
    }

    pub(crate) fn grid_mismatch(series: impl Into<String>, reason: impl Into<String>) -> Self {
        RaterError::GridMismatch {
            series: series.into(),
            reason: reason.into(),
        }
    }
}

/// Type alias for Results using RaterError
pub type Result<T> = std::result::Result<T, RaterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_retryable() {
        let server = FetchError::Status {
            status: 503,
            body: String::new(),
        };
        let throttled = FetchError::Status {
            status: 429,
            body: String::new(),
        };
        let not_found = FetchError::Status {
            status: 404,
            body: String::new(),
        };

        assert!(server.is_retryable());
        assert!(throttled.is_retryable());
        assert!(!not_found.is_retryable());
    }

    #[test]
    fn test_exhausted_is_not_retryable() {
        let err = FetchError::RetriesExhausted {
            attempts: 3,
            last: Box::new(FetchError::Status {
                status: 500,
                body: "boom".to_string(),
            }),
        };
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("3 attempts"));
    }
}
