use std::time::Duration;

/// A [`std::result::Result`] with the client [`Error`] as the error variant
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),

    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// The job reached `DONE` with an `errorResult`.
    #[error("Job {job_id} failed ({reason}): {message}")]
    JobFailed {
        job_id: String,
        reason: String,
        message: String,
    },

    /// The job did not reach `DONE` within the configured maximum wait.
    #[error("Gave up waiting for job {job_id} after {waited:?}")]
    Timeout { job_id: String, waited: Duration },

    #[error("Invalid client configuration: {0}")]
    InvalidConfiguration(String),
}

impl Error {
    /// True for errors that may go away on their own: transport timeouts, connection failures,
    /// rate limiting and server errors. Polling a job keeps going through these.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(err) => err.is_timeout() || err.is_connect(),
            Error::ApiError { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
