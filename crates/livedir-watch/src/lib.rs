//! Directory watching for livedir.
//!
//! Turns filesystem activity under the served root into debounced reload
//! notifications:
//!
//! ```text
//! notify backend ──► DirectoryWatcher event loop ──► Debouncer ──► ReloadSink::notify()
//!                     │        │
//!                     │        └─ registers newly created directories
//!                     └─ drops excluded paths and read-only access events
//! ```
//!
//! - [`is_excluded`] is the substring filter shared by the startup walk and
//!   the event loop.
//! - [`Debouncer`] keeps a single pending timer and rearms it on every event.
//! - [`DirectoryWatcher`] owns the watch set and the event loop; dropping the
//!   returned [`WatchHandle`] stops it.
//!
//! The sink is a trait so this crate does not depend on the HTTP layer.

mod debouncer;
mod error;
mod filter;
mod watcher;

pub use debouncer::{Debouncer, ReloadSink};
pub use error::WatchError;
pub use filter::is_excluded;
pub use watcher::{DirectoryWatcher, WatchHandle, collect_watch_dirs};
