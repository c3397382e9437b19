//! Whole-file persistence helpers.
//!
//! Both the dependency cache and saved search results are rewritten in
//! full on every save. Bytes go to a sibling `.tmp` file first, then the
//! old file is removed and the staging file renamed into place. A failure
//! while writing the staging file leaves the old file intact; a failure of
//! the final rename leaves no file at `path`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Replace `path` with `bytes`, creating parent directories as needed.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let staging = staging_path(path);
    fs::write(&staging, bytes)?;

    // Windows refuses to rename onto an existing file.
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            let _ = fs::remove_file(&staging);
            return Err(e);
        }
    }

    fs::rename(&staging, path).map_err(|e| {
        let _ = fs::remove_file(&staging);
        e
    })
}

/// Delete `path`, treating an already-missing file as success.
pub fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("refgraph");
    path.with_file_name(format!("{name}.tmp"))
}
