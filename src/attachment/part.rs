//! Temporary `.part` file removed unless committed.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::FetchError;

/// Hidden sibling of a download destination.
///
/// Dropping the guard before [`PartFile::commit`] deletes the file.
#[derive(Debug)]
pub(super) struct PartFile {
    path: PathBuf,
    committed: bool,
}

impl PartFile {
    /// Guards `.{file_name}.part` in the directory of `destination`.
    pub(super) fn beside(destination: &Path, file_name: &OsStr) -> Self {
        let mut name = std::ffi::OsString::from(".");
        name.push(file_name);
        name.push(".part");
        Self {
            path: destination.with_file_name(name),
            committed: false,
        }
    }

    pub(super) fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically moves the temporary file onto `destination`.
    pub(super) async fn commit(mut self, destination: &Path) -> Result<(), FetchError> {
        tokio::fs::rename(&self.path, destination)
            .await
            .map_err(|e| FetchError::io(destination, e))?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed partial download"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "failed to remove partial download"
            ),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_part_path_is_hidden_sibling() {
        let destination = Path::new("downloads/en.subject.pdf");
        let part = PartFile::beside(destination, OsStr::new("en.subject.pdf"));
        assert_eq!(part.path(), Path::new("downloads/.en.subject.pdf.part"));
        std::mem::forget(part);
    }

    #[test]
    fn test_dropped_guard_removes_file() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("a.pdf");
        let part = PartFile::beside(&destination, OsStr::new("a.pdf"));
        std::fs::write(part.path(), b"half").unwrap();
        let part_path = part.path().to_path_buf();

        drop(part);
        assert!(!part_path.exists());
        assert!(!destination.exists());
    }

    #[tokio::test]
    async fn test_commit_renames_onto_destination() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("a.pdf");
        std::fs::write(&destination, b"old").unwrap();
        let part = PartFile::beside(&destination, OsStr::new("a.pdf"));
        std::fs::write(part.path(), b"new").unwrap();
        let part_path = part.path().to_path_buf();

        part.commit(&destination).await.unwrap();
        assert_eq!(std::fs::read(&destination).unwrap(), b"new");
        assert!(!part_path.exists());
    }
}
