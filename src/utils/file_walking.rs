use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};
use walkdir::{DirEntry, WalkDir};

use crate::errors::TryciError;

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with("."))
        .unwrap_or(false)
}

fn direct_children(root: &Path) -> impl Iterator<Item = Result<DirEntry, walkdir::Error>> {
    WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
}

/// Sub-directories of `root`, sorted by name.
pub fn module_directories(root: &Path) -> Result<Vec<PathBuf>, TryciError> {
    let mut directories = vec![];
    for entry in direct_children(root) {
        let entry = entry?;
        if entry.file_type().is_dir() {
            directories.push(entry.into_path());
        }
    }
    Ok(directories)
}

/// Files directly inside `root` with the given extension, sorted by name.
pub fn files_with_extension(root: &Path, extension: &str) -> Result<Vec<PathBuf>, TryciError> {
    let mut files = vec![];
    for entry in direct_children(root) {
        let entry = entry?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(OsStr::to_str) == Some(extension)
        {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
