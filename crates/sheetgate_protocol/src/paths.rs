use std::path::{Path, PathBuf};

use crate::defaults::DEFAULT_STAGING_DIR;

/// Resolve a possibly relative path against the current working directory.
///
/// Falls back to the path as given when the working directory cannot be read.
pub fn absolutize(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

/// Default staging directory: ./uploads
pub fn default_staging_dir() -> PathBuf {
    absolutize(DEFAULT_STAGING_DIR)
}
