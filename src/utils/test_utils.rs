use std::fs;
use std::path::Path;

/// Creates each `(relative path, content)` pair under `root`, parents
/// included.
pub fn write_files(root: &Path, files: &[(&str, &str)]) {
    for (relative, content) in files {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Should create parent directory");
        }
        fs::write(&path, content).expect("Should write test file");
    }
}
