//! Resolution of the on-disk location for a test file's snapshots.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

/// Where one test file's snapshots live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPaths {
    /// Directory holding the snapshot file.
    pub dir: PathBuf,
    /// The test file, relative to the project root where possible.
    pub rel_file: PathBuf,
    /// Bare snapshot file name, `<test file name>.snap`.
    pub snap_file: String,
    /// Full path to the snapshot file.
    pub snap_path: PathBuf,
}

/// Determine the directory a test file's snapshots are stored in.
///
/// With a fixed location configured, snapshots mirror the test's path
/// relative to the project under that location. Otherwise test files in a
/// `__tests__` tree get a `__snapshots__` directory next to them, files in
/// a `test` or `tests` tree get `snapshots`, and anything else keeps its
/// snapshots beside the test file.
pub fn determine_snapshot_dir(
    file: &Path,
    fixed_location: Option<&Path>,
    project_dir: &Path,
) -> PathBuf {
    let test_dir = file.parent().unwrap_or_else(|| Path::new(""));
    let relative = test_dir.strip_prefix(project_dir).unwrap_or(test_dir);

    if let Some(fixed) = fixed_location {
        return fixed.join(relative);
    }

    let parts: HashSet<&str> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect();

    if parts.contains("__tests__") {
        test_dir.join("__snapshots__")
    } else if parts.contains("test") || parts.contains("tests") {
        // Accept `tests` even though it is not in the default test patterns.
        test_dir.join("snapshots")
    } else {
        test_dir.to_path_buf()
    }
}

/// Resolve the full set of snapshot paths for a test file.
pub fn determine_snapshot_paths(
    file: &Path,
    fixed_location: Option<&Path>,
    project_dir: &Path,
) -> SnapshotPaths {
    let dir = determine_snapshot_dir(file, fixed_location, project_dir);
    let rel_file = file.strip_prefix(project_dir).unwrap_or(file).to_path_buf();
    let name = rel_file
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("unnamed");
    let snap_file = format!("{}.snap", name);
    let snap_path = dir.join(&snap_file);

    SnapshotPaths {
        dir,
        rel_file,
        snap_file,
        snap_path,
    }
}
