//! Error types for the HTTP server.

use livedir_watch::WatchError;

/// Server startup and runtime error.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Directory watcher failed to start.
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// Listener could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Requested `host:port`.
        addr: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// I/O error while serving.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
