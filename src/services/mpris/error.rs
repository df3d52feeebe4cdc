/// Errors that can occur during media operations
#[derive(thiserror::Error, Debug)]
pub enum MediaError {
    /// D-Bus communication error
    #[error("D-Bus operation failed: {0}")]
    DbusError(#[from] zbus::Error),

    /// Failed to initialize the media service
    #[error("Failed to initialize media service: {0}")]
    InitializationFailed(String),

    /// The engine task is no longer running
    #[error("Media engine has stopped")]
    EngineStopped,
}

/// Errors produced while fetching cover art bytes.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    /// The fetch was superseded or the fetcher was torn down.
    #[error("fetch cancelled")]
    Cancelled,

    /// Reading a local file failed
    #[error("failed to read '{uri}': {source}")]
    Io {
        /// URI that was being read
        uri: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Fetching a remote image failed
    #[error("failed to fetch '{uri}': {source}")]
    Http {
        /// URI that was being fetched
        uri: String,
        /// Underlying HTTP error
        #[source]
        source: reqwest::Error,
    },

    /// The transport did not finish in time
    #[error("timed out fetching '{0}'")]
    TimedOut(String),

    /// URI scheme is not supported, or remote fetches are disabled
    #[error("unsupported cover uri '{0}'")]
    UnsupportedScheme(String),
}

impl FetchError {
    /// Cancellation is not a failure and must never trigger fallback.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
