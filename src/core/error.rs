use reqwest::StatusCode;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("size probe failed: {0:#}")]
    Probe(anyhow::Error),

    #[error("size probe returned status {0}")]
    ProbeStatus(StatusCode),

    /// HEAD answered without a usable Content-Length.
    #[error("server did not report a usable content length")]
    UnknownLength,

    #[error("unexpected http status: expected {expected}, got {got}")]
    UnexpectedStatus { expected: StatusCode, got: StatusCode },

    #[error("no data received within {0:?}")]
    ReadTimeout(Duration),

    #[error("body length mismatch: expected {expected} bytes, received {received}")]
    LengthMismatch { expected: u64, received: u64 },

    #[error("download cancelled")]
    Cancelled,

    #[error("gave up after {attempts} attempts: {source:#}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error("worker task panicked: {0}")]
    WorkerPanicked(String),
}

impl FetchError {
    /// Whether an error (possibly wrapped in context) is a cancellation
    /// rather than a real failure.
    pub fn is_cancelled(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<FetchError>(), Some(FetchError::Cancelled))
    }
}
