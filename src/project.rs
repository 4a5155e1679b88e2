//! Locating the files a transform should run on.

use std::path::{Path, PathBuf};

use ignore::{DirEntry, WalkBuilder};
use tracing::{debug, warn};

/// Directories never worth descending into
const SKIPPED_DIRS: &[&str] = &[
    "node_modules",
    "target",
    "dist",
    "build",
    "out",
    ".git",
    ".svelte-kit",
    ".react-router",
    ".cache",
    ".next",
    ".vscode",
    ".idea",
    "ios",
    "android",
];

fn keep_entry(entry: &DirEntry) -> bool {
    let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
    if !is_dir || entry.depth() == 0 {
        return true;
    }
    let name = entry.file_name().to_string_lossy();
    !SKIPPED_DIRS.contains(&name.as_ref())
}

fn walker(root: &Path) -> ignore::Walk {
    WalkBuilder::new(root)
        .standard_filters(true)
        .hidden(false)
        .filter_entry(keep_entry)
        .build()
}

/// The first of `candidates` (paths relative to `root`) that exists.
///
/// Candidates are checked in order, e.g. `["vite.config.ts", "vite.config.js"]`.
pub fn find_first<S: AsRef<str>>(root: &Path, candidates: &[S]) -> Option<PathBuf> {
    let found = candidates
        .iter()
        .map(|candidate| root.join(candidate.as_ref()))
        .find(|path| path.is_file());
    debug!(root = %root.display(), found = ?found, "resolved config file");
    found
}

/// Every file below `root` whose name is one of `names`, sorted by path.
///
/// Honors `.gitignore` and skips dependency, build output and VCS directories.
pub fn find_files<S: AsRef<str>>(root: &Path, names: &[S]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for result in walker(root) {
        match result {
            Ok(entry) => {
                let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
                if !is_file {
                    continue;
                }
                let name = entry.file_name().to_string_lossy();
                if names.iter().any(|n| n.as_ref() == name) {
                    files.push(entry.into_path());
                }
            }
            Err(err) => warn!(%err, "error walking project"),
        }
    }
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_find_first_respects_order() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "vite.config.js");
        touch(dir.path(), "vite.config.mjs");

        let found = find_first(dir.path(), &["vite.config.ts", "vite.config.mjs", "vite.config.js"]);
        assert_eq!(found, Some(dir.path().join("vite.config.mjs")));
        assert_eq!(find_first(dir.path(), &["svelte.config.js"]), None);
    }

    #[test]
    fn test_find_files_skips_dependencies() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "src/hooks.server.ts");
        touch(dir.path(), "src/hooks.client.ts");
        touch(dir.path(), "node_modules/pkg/hooks.server.ts");
        touch(dir.path(), "build/hooks.server.ts");

        let found = find_files(dir.path(), &["hooks.server.ts", "hooks.client.ts"]);
        assert_eq!(
            found,
            vec![
                dir.path().join("src/hooks.client.ts"),
                dir.path().join("src/hooks.server.ts"),
            ]
        );
    }
}
