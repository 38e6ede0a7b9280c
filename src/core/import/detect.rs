use std::path::{Path, PathBuf};

use crate::core::import::manifest::CURATED_MANIFEST_FILE;
use crate::core::instance::model::INSTANCE_CONFIG_FILE;

/// Pack format of an extracted archive, as identified by its marker file.
/// Each variant carries the marker's location inside the staged tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackFormat {
    /// Archive is already in Mantle's own instance layout (`instance.json`).
    Native(PathBuf),
    /// Curated third-party pack with a `manifest.json` file list.
    Curated(PathBuf),
}

/// Identify the pack format of an extracted tree.
///
/// The native marker always wins over the curated one, regardless of how
/// deep either sits. The tiebreak is a fixed rule, not an accident of
/// traversal order, so archives carrying both markers import the same way
/// on every platform.
pub fn detect_pack_format(root: &Path) -> Option<PackFormat> {
    if let Some(marker) = find_recursive(root, INSTANCE_CONFIG_FILE) {
        return Some(PackFormat::Native(marker));
    }
    if let Some(marker) = find_recursive(root, CURATED_MANIFEST_FILE) {
        return Some(PackFormat::Curated(marker));
    }
    None
}

/// Breadth-first search for a file named `name` under `dir`. Files in a
/// directory are considered before its subdirectories, and entries are
/// visited in name order for deterministic results.
pub fn find_recursive(dir: &Path, name: &str) -> Option<PathBuf> {
    let wanted = std::ffi::OsStr::new(name);
    let entries = std::fs::read_dir(dir).ok()?;

    let mut files = Vec::new();
    let mut dirs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
        } else {
            files.push(path);
        }
    }
    files.sort();
    dirs.sort();

    for file in files {
        if file.file_name() == Some(wanted) {
            return Some(file);
        }
    }

    for sub in dirs {
        if let Some(found) = find_recursive(&sub, name) {
            return Some(found);
        }
    }

    None
}
