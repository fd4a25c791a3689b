//! Directory watcher.
//!
//! Registers every non-excluded directory under the served root with the
//! platform notification backend, one non-recursive watch per directory, and
//! keeps that set in sync as directories are created.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::debouncer::{Debouncer, ReloadSink};
use crate::error::WatchError;
use crate::filter::is_excluded;

/// Watches a directory tree and feeds a [`Debouncer`].
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use std::time::Duration;
/// use livedir_watch::DirectoryWatcher;
///
/// let handle = DirectoryWatcher::new("site", vec![".git".to_owned()])
///     .with_debounce(Duration::from_millis(100))
///     .start(Arc::new(broadcaster))?;
/// ```
pub struct DirectoryWatcher {
    root: PathBuf,
    excludes: Vec<String>,
    debounce: Duration,
}

/// Default debounce duration in milliseconds.
const DEFAULT_DEBOUNCE_MS: u64 = 100;

impl DirectoryWatcher {
    /// Create a watcher for `root`, ignoring paths containing any of `excludes`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, excludes: Vec<String>) -> Self {
        Self {
            root: root.into(),
            excludes,
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
        }
    }

    /// Set the reload debounce window.
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Register the tree and spawn the event loop.
    ///
    /// Must be called from within a tokio runtime. Watching stops when the
    /// returned handle is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is not a directory, the platform watcher
    /// cannot be created, or the root itself cannot be registered.
    pub fn start(self, sink: Arc<dyn ReloadSink>) -> Result<WatchHandle, WatchError> {
        let root = fs::canonicalize(&self.root)
            .ok()
            .filter(|p| p.is_dir())
            .ok_or_else(|| WatchError::RootMissing(self.root.clone()))?;

        // The backend calls us from its own thread; hand everything, errors
        // included, to the single event loop.
        let (tx, rx) = mpsc::unbounded_channel();
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        })
        .map_err(WatchError::Init)?;

        let mut watch_set = WatchSet::new(watcher);
        watch_set
            .watch(&root)
            .map_err(|source| WatchError::Register {
                path: root.clone(),
                source,
            })?;

        let excludes: Arc<[String]> = self.excludes.into();
        for dir in collect_watch_dirs(&root, &excludes).into_iter().skip(1) {
            watch_set.register(&dir);
        }

        tracing::info!(
            root = %root.display(),
            directories = watch_set.len(),
            debounce = ?self.debounce,
            "Watching for changes"
        );

        let event_loop = EventLoop {
            root,
            excludes,
            watch_set,
            debouncer: Debouncer::new(self.debounce, sink),
            rx,
        };
        let task = tokio::spawn(event_loop.run());

        Ok(WatchHandle { task })
    }
}

/// Handle to a running watcher.
///
/// Dropping the handle stops the event loop and releases every OS watch.
pub struct WatchHandle {
    task: JoinHandle<()>,
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Directories currently registered with the backend.
///
/// Registration always goes to the backend, even for a path seen before: a
/// directory that was deleted and recreated lost its OS watch with the old
/// inode. The set only tracks what is registered, for logging.
struct WatchSet {
    watcher: RecommendedWatcher,
    dirs: HashSet<PathBuf>,
}

impl WatchSet {
    fn new(watcher: RecommendedWatcher) -> Self {
        Self {
            watcher,
            dirs: HashSet::new(),
        }
    }

    fn len(&self) -> usize {
        self.dirs.len()
    }

    fn watch(&mut self, dir: &Path) -> notify::Result<()> {
        self.watcher.watch(dir, RecursiveMode::NonRecursive)?;
        self.dirs.insert(dir.to_path_buf());
        Ok(())
    }

    /// Drop `path` and everything beneath it after a removal.
    fn forget(&mut self, path: &Path) {
        self.dirs.retain(|dir| !dir.starts_with(path));
    }

    /// Best-effort registration; the directory may already be gone.
    fn register(&mut self, dir: &Path) {
        if let Err(e) = self.watch(dir) {
            tracing::debug!(path = %dir.display(), error = %e, "Failed to watch directory");
        }
    }
}

/// Single consumer of the backend's event feed.
struct EventLoop {
    root: PathBuf,
    excludes: Arc<[String]>,
    watch_set: WatchSet,
    debouncer: Debouncer,
    rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
}

impl EventLoop {
    async fn run(mut self) {
        while let Some(res) = self.rx.recv().await {
            match res {
                Ok(event) => self.handle_event(&event),
                Err(e) => tracing::warn!(error = %e, "Watch error"),
            }
        }
    }

    fn handle_event(&mut self, event: &Event) {
        // Reads (e.g. serving a page) must not cause another reload.
        if matches!(event.kind, EventKind::Access(_)) {
            return;
        }

        let may_be_new_dir = introduces_path(event.kind);
        let removed = matches!(
            event.kind,
            EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From))
        );
        let mut accepted = false;

        for path in &event.paths {
            if is_excluded(relative_to(path, &self.root), &self.excludes) {
                continue;
            }
            accepted = true;

            if removed {
                self.watch_set.forget(path);
            }

            if may_be_new_dir && path.is_dir() {
                for dir in collect_watch_dirs(path, &self.excludes) {
                    if !is_excluded(relative_to(&dir, &self.root), &self.excludes) {
                        self.watch_set.register(&dir);
                    }
                }
                tracing::debug!(
                    path = %path.display(),
                    directories = self.watch_set.len(),
                    "Watching new directory"
                );
            }
        }

        if accepted {
            tracing::debug!(paths = ?event.paths, kind = ?event.kind, "Change detected");
            self.debouncer.trigger();
        }
    }
}

/// Whether `kind` can make a previously unseen path appear.
fn introduces_path(kind: EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_)
            | EventKind::Modify(ModifyKind::Name(
                RenameMode::To | RenameMode::Both | RenameMode::Any
            ))
    )
}

/// `path` relative to `root`, or `path` itself when outside of it.
fn relative_to<'a>(path: &'a Path, root: &Path) -> &'a Path {
    path.strip_prefix(root).unwrap_or(path)
}

/// Collect `dir` and every directory beneath it that should be watched.
///
/// `dir` itself comes first and is never filtered. Excluded directories are
/// not descended into. Symlinked directories are not followed. Unreadable
/// directories are skipped.
#[must_use]
pub fn collect_watch_dirs(dir: &Path, excludes: &[String]) -> Vec<PathBuf> {
    let mut dirs = vec![dir.to_path_buf()];
    walk_dirs(dir, dir, excludes, &mut dirs);
    dirs
}

fn walk_dirs(dir: &Path, base: &Path, excludes: &[String], out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    for entry in entries.filter_map(Result::ok) {
        if !entry.file_type().is_ok_and(|t| t.is_dir()) {
            continue;
        }

        let path = entry.path();
        if is_excluded(relative_to(&path, base), excludes) {
            continue;
        }

        out.push(path.clone());
        walk_dirs(&path, base, excludes, out);
    }
}
