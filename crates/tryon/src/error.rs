use std::time::Duration;

use thiserror::Error;

use crate::client::JobState;

#[derive(Error, Debug)]
pub enum TryOnError {
    #[error("Try-on request rejected: {message}")]
    Submission { message: String },

    #[error("Job {job_id} completed without an output image")]
    MissingOutput { job_id: String },

    #[error("Job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },

    #[error("Job {job_id} was canceled by the service: {message}")]
    JobCanceled { job_id: String, message: String },

    #[error("Try-on did not finish within {budget:?}")]
    TimedOut { budget: Duration },

    #[error("Try-on canceled")]
    Canceled,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("No API key available; set {0}")]
    MissingApiKey(String),
}

impl TryOnError {
    /// Terminal job state this error puts a job in
    pub fn terminal_state(&self) -> JobState {
        match self {
            Self::TimedOut { .. } => JobState::TimedOut,
            Self::Canceled | Self::JobCanceled { .. } => JobState::Canceled,
            _ => JobState::Failed,
        }
    }

    /// True for transport-level failures (never retried)
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Http { .. })
    }
}

pub type Result<T> = std::result::Result<T, TryOnError>;
