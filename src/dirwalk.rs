//! Directory enumeration for the sender: list the regular files directly
//! inside a source directory, skipping subdirectories and anything that
//! isn't a regular file (mirroring the original's `isFile` stat check).

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};

/// Verify `dir` exists and is a directory, exiting the way the original
/// `checkDirectory` does (the spec's exit code 8).
pub fn check_directory(dir: &Path) -> Result<()> {
    let metadata = std::fs::metadata(dir)
        .map_err(|_| anyhow!("source directory does not exist: {}", dir.display()))?;
    if !metadata.is_dir() {
        return Err(anyhow!("{} exists but is not a directory", dir.display()));
    }
    Ok(())
}

/// List the regular files directly inside `dir`, in directory-read order.
pub fn list_regular_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_file() {
            out.push(entry.path());
        }
    }
    Ok(out)
}
