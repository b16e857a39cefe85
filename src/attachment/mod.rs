//! Atomic streaming download of attachment bodies.
//!
//! Bodies are streamed chunk by chunk into a hidden sibling file
//! (`.{name}.part`) and renamed onto the destination only once complete.
//! An error, a timeout or a dropped future removes the temporary file, so
//! the destination either holds a complete body or is left untouched.

mod part;

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};

use crate::error::FetchError;
use crate::session::Session;
use crate::versioning::DownloadDescriptor;

use part::PartFile;

/// Streams attachment bodies to disk through a shared session.
#[derive(Debug, Clone)]
pub struct AttachmentDownloader {
    session: Session,
}

impl AttachmentDownloader {
    /// Creates a downloader using `session` (its request timeout bounds each transfer).
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// Downloads `remote_url` to `local_path`, returning the number of bytes written.
    ///
    /// Parent directories are created as needed and an existing file at
    /// `local_path` is replaced. When the server sends `Last-Modified`, the
    /// file's modification time is set to it.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Timeout`] / [`FetchError::Network`] when the transfer fails
    /// - [`FetchError::Truncated`] when fewer bytes than `Content-Length` arrived
    /// - status-derived variants (`Auth`, `NotFound`, ...) from the response
    /// - [`FetchError::Io`] for local file system failures
    #[instrument(skip(self, local_path), fields(local_path = %local_path.display()))]
    pub async fn download(&self, remote_url: &str, local_path: &Path) -> Result<u64, FetchError> {
        let file_name = local_path
            .file_name()
            .ok_or_else(|| {
                FetchError::io(
                    local_path,
                    std::io::Error::other("destination has no file name"),
                )
            })?;
        if let Some(parent) = local_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FetchError::io(parent, e))?;
        }

        let response = self.session.get(remote_url).await?;
        let url = response.url().to_string();
        let expected_bytes = response.content_length();
        let last_modified = response.last_modified();
        let (response, _permit) = response.into_parts();

        let part = PartFile::beside(local_path, file_name);
        let file = File::create(part.path())
            .await
            .map_err(|e| FetchError::io(part.path(), e))?;
        debug!(part = %part.path().display(), "streaming body");

        let mut writer = BufWriter::new(file);
        let mut stream = response.bytes_stream();
        let mut bytes_written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FetchError::network(&url, e))?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| FetchError::io(part.path(), e))?;
            bytes_written += chunk.len() as u64;
        }

        if let Some(expected) = expected_bytes
            && expected != bytes_written
        {
            return Err(FetchError::Truncated {
                path: part.path().to_path_buf(),
                expected_bytes: expected,
                actual_bytes: bytes_written,
            });
        }

        writer
            .flush()
            .await
            .map_err(|e| FetchError::io(part.path(), e))?;
        let file = writer.into_inner();
        file.sync_all()
            .await
            .map_err(|e| FetchError::io(part.path(), e))?;
        if let Some(timestamp) = last_modified {
            stamp_modified(file, part.path(), timestamp).await?;
        }

        part.commit(local_path).await?;
        info!(path = %local_path.display(), bytes = bytes_written, "download complete");
        Ok(bytes_written)
    }

    /// Downloads a resolved attachment when it needs fetching.
    ///
    /// Returns `None` without any network traffic when `should_fetch` is false.
    ///
    /// # Errors
    ///
    /// See [`AttachmentDownloader::download`].
    pub async fn download_resolved(
        &self,
        descriptor: &DownloadDescriptor,
    ) -> Result<Option<u64>, FetchError> {
        if !descriptor.should_fetch {
            debug!(path = %descriptor.resolved_path.display(), "already current");
            return Ok(None);
        }
        self.download(&descriptor.remote_url, &descriptor.resolved_path)
            .await
            .map(Some)
    }
}

async fn stamp_modified(
    file: File,
    path: &Path,
    timestamp: DateTime<Utc>,
) -> Result<(), FetchError> {
    let file = file.into_std().await;
    let mtime = SystemTime::from(timestamp);
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        file.set_modified(mtime).map_err(|e| FetchError::io(path, e))
    })
        .await
        .map_err(|e| FetchError::Worker {
            reason: e.to_string(),
        })?
}
