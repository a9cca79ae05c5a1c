use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised while talking to an upstream price source.
///
/// Only [`PriceError::TransientNetwork`] is retried by
/// [`RetryPolicy`](crate::RetryPolicy); everything else is permanent.
#[derive(Error, Debug)]
pub enum PriceError {
    /// Timeouts, refused connections, 5xx and 429 responses.
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// The upstream explicitly said the symbol or pair does not exist.
    #[error("not found upstream: {0}")]
    UpstreamNotFound(String),

    /// The response arrived but could not be understood.
    #[error("malformed upstream payload: {0}")]
    UpstreamMalformed(String),

    /// Any other 4xx status.
    #[error("upstream rejected request with status {0}")]
    UpstreamRejected(StatusCode),

    /// Retry budget used up on transient errors.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<PriceError>,
    },
}

impl PriceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientNetwork(_))
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            Self::TransientNetwork(format!("status {status}"))
        } else if status == StatusCode::NOT_FOUND {
            Self::UpstreamNotFound(body.trim().to_string())
        } else {
            Self::UpstreamRejected(status)
        }
    }
}

impl From<reqwest::Error> for PriceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            return Self::TransientNetwork(e.to_string());
        }
        if let Some(status) = e.status() {
            return Self::from_status(status, "");
        }
        if e.is_decode() || e.is_body() {
            return Self::UpstreamMalformed(e.to_string());
        }
        if e.is_request() {
            return Self::TransientNetwork(e.to_string());
        }
        Self::UpstreamMalformed(e.to_string())
    }
}

impl From<serde_json::Error> for PriceError {
    fn from(e: serde_json::Error) -> Self {
        Self::UpstreamMalformed(e.to_string())
    }
}
