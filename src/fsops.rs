use anyhow::{Context, Result};
use std::io;
use std::path::Path;

/// Rename `src` to `dst` within the same filesystem.
pub fn rename(src: &Path, dst: &Path) -> Result<()> {
    std::fs::rename(src, dst)
        .with_context(|| format!("failed to rename {} -> {}", src.display(), dst.display()))
}

/// Create the parent directory of `dst` (and its ancestors) if missing.
pub fn ensure_parent(dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("prepare target directory {}", parent.display()))?;
    }
    Ok(())
}

/// Check whether anything (including a dangling symlink) occupies `path`.
pub fn occupied(path: &Path) -> io::Result<Option<std::fs::Metadata>> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) => Ok(Some(meta)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// Check if two paths name the same underlying filesystem object.
#[cfg(unix)]
pub fn same_file(a: &Path, b: &Path) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;
    let a_meta = std::fs::symlink_metadata(a)?;
    let b_meta = std::fs::symlink_metadata(b)?;
    Ok(a_meta.dev() == b_meta.dev() && a_meta.ino() == b_meta.ino())
}

#[cfg(not(unix))]
pub fn same_file(_a: &Path, _b: &Path) -> io::Result<bool> {
    // volume_serial_number/file_index are unstable (feature `windows_by_handle`).
    // Treat every pre-existing path as a different file.
    Ok(false)
}
