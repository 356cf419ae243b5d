use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MlError {
    #[error("ML service did not answer within {0:?}")]
    Timeout(Duration),

    #[error("ML service unreachable: {0}")]
    Transport(String),

    #[error("ML service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected ML service response: {0}")]
    Decode(String),

    #[error("Invalid detection options: {0}")]
    InvalidOptions(String),

    /// Raised by image downloads, the only operation without a fallback result.
    #[error("Download failed: {0}")]
    DownloadFailed(String),
}

impl MlError {
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            MlError::Timeout(timeout)
        } else if err.is_decode() {
            MlError::Decode(err.to_string())
        } else {
            MlError::Transport(err.to_string())
        }
    }
}
