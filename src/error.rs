//! Error types for the TuneIn client

/// Result type alias for TuneIn operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when using the TuneIn client
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// API returned an error status in its JSON head
    #[error("API error: {0}")]
    ApiError(String),

    /// No playable stream could be resolved for a station
    #[error("No playable stream found for: {0}")]
    NoPlayableStream(String),

    /// Playlist download failed
    #[error("Playlist download failed for {0}")]
    DownloadFailed(String),

    /// Content probe could not determine playability
    #[error("Probe failed for {0}: {1}")]
    ProbeFailed(String, String),

    /// The resolution session ran out of time
    #[error("Stream resolution deadline exceeded")]
    DeadlineExceeded,
}

impl Error {
    /// Create an API error
    pub fn api_error(msg: impl Into<String>) -> Self {
        Self::ApiError(msg.into())
    }
}
