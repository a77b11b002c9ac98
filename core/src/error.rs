use thiserror::Error;

/// Why a single endpoint attempt (or a whole probe cycle) did not yield a payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("connection error: {0}")]
    Connection(String),
    #[error("tls error: {0}")]
    Tls(String),
    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("worker failed: {0}")]
    Worker(String),
}

impl FetchError {
    /// Short machine-friendly name for reports.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Timeout => "timeout",
            FetchError::Connection(_) => "connection",
            FetchError::Tls(_) => "tls",
            FetchError::HttpStatus(_) => "http-status",
            FetchError::Decode(_) => "decode",
            FetchError::Worker(_) => "worker",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout)
    }
}
