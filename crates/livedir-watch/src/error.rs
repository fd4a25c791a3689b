//! Watcher error types.

use std::path::PathBuf;

/// Error starting the directory watcher.
///
/// All variants are fatal at startup. Registration failures for directories
/// other than the root are logged and skipped instead.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The platform notification backend could not be created.
    #[error("Failed to initialize file watcher: {0}")]
    Init(#[source] notify::Error),

    /// The served root does not exist or is not a directory.
    #[error("Watch root is not a directory: {}", .0.display())]
    RootMissing(PathBuf),

    /// The served root could not be registered.
    #[error("Failed to watch {}: {source}", path.display())]
    Register {
        /// Directory that failed to register.
        path: PathBuf,
        /// Backend error.
        #[source]
        source: notify::Error,
    },
}
