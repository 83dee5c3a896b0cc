//! File admission primitives shared by the processor and gateway:
//! symlink rejection and the rename-or-copy cross-directory move.

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdmitError {
    #[error("refusing to admit symlink at {0}")]
    Symlink(std::path::PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reject symlinks unconditionally via a no-follow stat.
pub fn reject_symlink(path: &Path) -> Result<(), AdmitError> {
    let meta = std::fs::symlink_metadata(path)?;
    if meta.file_type().is_symlink() {
        return Err(AdmitError::Symlink(path.to_path_buf()));
    }
    Ok(())
}

/// Move `from` to `to`, renaming when both paths share a filesystem and
/// falling back to copy-then-unlink on `EXDEV` (cross-device, e.g. a
/// bind-mounted inbox) so the admission pipeline tolerates split
/// mounts.
pub fn move_file(from: &Path, to: &Path) -> Result<(), AdmitError> {
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(libc_exdev()) => {
            std::fs::copy(from, to)?;
            std::fs::remove_file(from)?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(unix)]
fn libc_exdev() -> i32 {
    18 // EXDEV on Linux and most unix targets
}

#[cfg(not(unix))]
fn libc_exdev() -> i32 {
    -1 // never matched; rename failures on non-unix surface directly
}
