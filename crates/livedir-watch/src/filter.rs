//! Substring-based path exclusion.

use std::path::Path;

/// Returns `true` if `path` contains any non-empty entry of `excludes`.
///
/// Entries are plain substrings, not globs: `".git"` also matches
/// `".github/workflows"`. Empty entries never match, so an exclusion list of
/// only empty strings excludes nothing.
#[must_use]
pub fn is_excluded(path: &Path, excludes: &[String]) -> bool {
    let path = path.to_string_lossy();
    excludes
        .iter()
        .any(|ex| !ex.is_empty() && path.contains(ex.as_str()))
}
