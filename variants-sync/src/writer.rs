//! Hash-gated atomic writer.
//!
//! 1. Content is fully rendered by the caller.
//! 2. SHA-256 of the new content is compared with the file on disk.
//! 3. Identical → skip, leaving bytes and mtime untouched.
//! 4. Otherwise write `<path>.variants.tmp` and rename it over `path`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{io_err, SyncError};

pub const TMP_SUFFIX: &str = ".variants.tmp";

/// Outcome of an individual file write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// File was written (content changed or did not previously exist).
    Written { path: PathBuf },
    /// File was skipped — on-disk content already matches.
    Unchanged { path: PathBuf },
}

impl WriteResult {
    pub fn path(&self) -> &Path {
        match self {
            WriteResult::Written { path } | WriteResult::Unchanged { path } => path,
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self, WriteResult::Written { .. })
    }
}

/// Hex SHA-256 digest of `bytes`.
pub fn digest(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    hex::encode(h.finalize())
}

fn on_disk_digest(path: &Path) -> Result<Option<String>, SyncError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(digest(&bytes))),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_err(path, err)),
    }
}

/// Atomically replace `path` with `content` unless it already holds it.
pub fn atomic_write(path: &Path, content: &str) -> Result<WriteResult, SyncError> {
    let tmp = PathBuf::from(format!("{}{TMP_SUFFIX}", path.display()));
    atomic_write_with_tmp(path, content, &tmp)
}

fn atomic_write_with_tmp(path: &Path, content: &str, tmp: &Path) -> Result<WriteResult, SyncError> {
    if on_disk_digest(path)?.as_deref() == Some(digest(content.as_bytes()).as_str()) {
        tracing::debug!(path = %path.display(), "unchanged");
        return Ok(WriteResult::Unchanged {
            path: path.to_path_buf(),
        });
    }

    std::fs::write(tmp, content).map_err(|e| io_err(tmp, e))?;
    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(path, e));
    }

    tracing::debug!(path = %path.display(), "wrote");
    Ok(WriteResult::Written {
        path: path.to_path_buf(),
    })
}

/// Create `path` with `content`, failing if it already exists.
pub(crate) fn create_new(path: &Path, content: &[u8]) -> Result<(), SyncError> {
    use std::io::Write;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| {
            if e.kind() == ErrorKind::AlreadyExists {
                SyncError::Conflict(format!("{} already exists", path.display()))
            } else {
                io_err(path, e)
            }
        })?;
    file.write_all(content).map_err(|e| io_err(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn first_write_returns_written() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("Widget.manifest.ts");
        let result = atomic_write(&path, "hello").unwrap();
        assert!(result.is_written());
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello");
    }

    #[test]
    fn same_content_is_unchanged_and_keeps_mtime() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("file.ts");
        atomic_write(&path, "same").unwrap();
        let old = FileTime::from_unix_time(1_000_000, 0);
        filetime::set_file_mtime(&path, old).unwrap();

        let result = atomic_write(&path, "same").unwrap();
        assert!(matches!(result, WriteResult::Unchanged { .. }));
        let mtime = FileTime::from_last_modification_time(&fs::metadata(&path).unwrap());
        assert_eq!(mtime, old);
    }

    #[test]
    fn hand_edited_file_is_rewritten() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("file.ts");
        atomic_write(&path, "generated").unwrap();
        fs::write(&path, "edited").unwrap();
        assert!(atomic_write(&path, "generated").unwrap().is_written());
        assert_eq!(fs::read_to_string(&path).unwrap(), "generated");
    }

    #[test]
    fn tmp_file_removed_after_write() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("clean.ts");
        atomic_write(&path, "data").unwrap();
        let tmp_path = PathBuf::from(format!("{}{TMP_SUFFIX}", path.display()));
        assert!(!tmp_path.exists());
    }

    #[test]
    fn create_new_refuses_existing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("Widget.v1.tsx");
        create_new(&path, b"one").unwrap();
        let err = create_new(&path, b"two").unwrap_err();
        assert!(matches!(err, SyncError::Conflict(_)), "{err}");
        assert_eq!(fs::read(&path).unwrap(), b"one");
    }

    #[test]
    #[cfg(unix)]
    fn rename_failure_leaves_original_and_cleans_tmp() {
        use std::os::unix::fs::PermissionsExt;

        let root = TempDir::new().unwrap();
        let readonly_dir = root.path().join("readonly");
        fs::create_dir_all(&readonly_dir).unwrap();
        let path = readonly_dir.join("file.ts");
        fs::write(&path, "original").unwrap();

        let mut perms = fs::metadata(&readonly_dir).unwrap().permissions();
        perms.set_mode(0o555);
        fs::set_permissions(&readonly_dir, perms).unwrap();

        let tmp_dir = TempDir::new().unwrap();
        let tmp_path = tmp_dir.path().join("file.ts.variants.tmp");
        let result = atomic_write_with_tmp(&path, "new content", &tmp_path);

        let mut perms = fs::metadata(&readonly_dir).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&readonly_dir, perms).unwrap();

        // Root ignores directory permissions; only assert when the rename failed.
        if result.is_err() {
            assert_eq!(fs::read_to_string(&path).unwrap(), "original");
            assert!(!tmp_path.exists());
        }
    }
}
