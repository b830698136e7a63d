//! Discovery of project roots on disk.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// File whose presence marks a directory as a project root.
pub const PROJECT_MARKER: &str = "devenv.nix";

const EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    ".direnv",
    "dist",
    "target",
    "vendor",
    ".venv",
    "__pycache__",
];

/// Expand a leading `~/` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

fn is_excluded(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| EXCLUDED_DIRS.contains(&name))
}

/// Find every directory under `roots` that contains [`PROJECT_MARKER`].
///
/// `max_depth` bounds how deep project directories may sit (1 means
/// immediate children of a root). Unreadable paths are skipped. Results are
/// sorted and deduplicated.
pub fn scan(roots: &[PathBuf], max_depth: usize) -> Vec<PathBuf> {
    let mut found = BTreeSet::new();

    for root in roots {
        let root = expand_home(root);
        let walker = WalkDir::new(&root)
            // The marker file sits one level below its directory.
            .max_depth(max_depth + 1)
            .into_iter()
            .filter_entry(|e| !is_excluded(e));

        for entry in walker.filter_map(Result::ok) {
            if entry.file_type().is_file() && entry.file_name() == PROJECT_MARKER {
                if let Some(dir) = entry.path().parent() {
                    found.insert(dir.to_path_buf());
                }
            }
        }
    }

    debug!(count = found.len(), "project scan finished");
    found.into_iter().collect()
}
