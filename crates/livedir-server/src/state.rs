//! Application state.
//!
//! Shared state for all request handlers.

use std::path::PathBuf;
use std::sync::Arc;

use tower_http::services::ServeDir;

use crate::live_reload::{Broadcaster, InjectionPolicy};

/// Application state shared across all handlers.
pub(crate) struct AppState {
    /// Reload fan-out, also the watcher's sink.
    pub(crate) broadcaster: Arc<Broadcaster>,
    /// Where and how the reload snippet goes into HTML.
    pub(crate) injection: InjectionPolicy,
    /// Served root directory.
    pub(crate) root: PathBuf,
    /// Plain static file service rooted at `root`.
    pub(crate) static_files: ServeDir,
}

impl AppState {
    pub(crate) fn new(
        root: PathBuf,
        broadcaster: Arc<Broadcaster>,
        injection: InjectionPolicy,
    ) -> Self {
        Self {
            static_files: ServeDir::new(&root),
            broadcaster,
            injection,
            root,
        }
    }
}
