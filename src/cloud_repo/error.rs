use std::time::Duration;

/// Failures talking to the compute provider. All of them are per-operation:
/// callers log and move on to the next VM.
#[derive(Debug, thiserror::Error)]
pub enum CloudError {
    /// Quota exceeded or permission denied (403 / 413).
    #[error("quota exceeded or permission denied: {0}")]
    Forbidden(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("server {name} went to {status}")]
    ServerFailed { name: String, status: String },
    #[error("timed out after {waited:?} waiting for {name} to {operation}")]
    Timeout {
        name: String,
        operation: &'static str,
        waited: Duration,
    },
}

impl CloudError {
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            403 | 413 => CloudError::Forbidden(body),
            _ => CloudError::Http { status, body },
        }
    }
}
