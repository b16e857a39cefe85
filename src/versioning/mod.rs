//! Versioned download resolution.
//!
//! Decides, from one metadata-only probe and the local filesystem, where a
//! remote attachment should be written and whether it needs fetching at
//! all. The filesystem is the only record of past downloads: the canonical
//! copy sits at the base path, later revisions next to it under
//! timestamp-suffixed names (see [`versioned_path`]).
//!
//! Comparison baseline, in order of preference:
//! 1. the newest existing versioned copy (its timestamp comes from its name);
//! 2. the canonical copy's modification time.
//!
//! The downloader stamps every file it writes with the remote
//! `Last-Modified`, so the canonical copy's mtime normally is the remote
//! revision it holds. A file placed there by other means is compared by
//! whatever mtime it has.

mod naming;

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info, instrument};

pub use naming::{
    VERSION_TIMESTAMP_FORMAT, attachment_file_name, sanitize_file_name, split_file_name,
    versioned_path,
};

use crate::error::FetchError;
use crate::session::Session;

/// Timestamps closer than this are considered equal.
pub const TIMESTAMP_TOLERANCE: Duration = Duration::from_secs(1);

/// Outcome of resolving one attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadDescriptor {
    /// URL that was probed.
    pub remote_url: String,
    /// Canonical local path requested by the caller.
    pub base_path: PathBuf,
    /// Remote `Last-Modified`, when the server supplied one.
    pub remote_last_modified: Option<DateTime<Utc>>,
    /// Timestamp of the local copy the decision was made against, if any.
    pub local_baseline: Option<DateTime<Utc>>,
    /// Where the file should be written, or already lives.
    pub resolved_path: PathBuf,
    /// Whether the body needs to be downloaded to `resolved_path`.
    pub should_fetch: bool,
}

/// Resolves remote attachments against local versioned copies.
#[derive(Debug, Clone)]
pub struct VersionResolver {
    session: Session,
}

impl VersionResolver {
    /// Creates a resolver probing through `session`.
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// Decides the destination of `remote_url` given the canonical `base_path`.
    ///
    /// - No remote `Last-Modified`: fetch to `base_path`.
    /// - No canonical copy yet: fetch to `base_path`.
    /// - Version for the remote timestamp already on disk: nothing to fetch.
    /// - Remote newer than the baseline (beyond one second): fetch to the
    ///   versioned path.
    /// - Otherwise nothing to fetch; the resolved path is `base_path`.
    ///
    /// No body is transferred.
    ///
    /// # Errors
    ///
    /// Returns the probe's [`FetchError`] (auth, not found, transport), or
    /// [`FetchError::Io`] when the local directory cannot be read.
    #[instrument(skip(self, base_path), fields(base_path = %base_path.display()))]
    pub async fn resolve(
        &self,
        remote_url: &str,
        base_path: &Path,
    ) -> Result<DownloadDescriptor, FetchError> {
        let remote = self.session.probe(remote_url).await?;
        let remote_last_modified = remote.last_modified;

        let mut descriptor = DownloadDescriptor {
            remote_url: remote_url.to_string(),
            base_path: base_path.to_path_buf(),
            remote_last_modified,
            local_baseline: None,
            resolved_path: base_path.to_path_buf(),
            should_fetch: true,
        };

        let Some(remote_ts) = remote_last_modified else {
            debug!("remote has no Last-Modified; treating as changed");
            return Ok(descriptor);
        };

        let Some(canonical_mtime) = modified_time(base_path).await? else {
            debug!("no canonical copy yet");
            return Ok(descriptor);
        };

        let candidate = versioned_path(base_path, remote_ts);
        if tokio::fs::try_exists(&candidate)
            .await
            .map_err(|e| FetchError::io(&candidate, e))?
        {
            debug!(path = %candidate.display(), "version already captured");
            descriptor.local_baseline = Some(remote_ts);
            descriptor.resolved_path = candidate;
            descriptor.should_fetch = false;
            return Ok(descriptor);
        }

        let baseline = match naming::newest_version(base_path).await? {
            Some((timestamp, _)) => timestamp,
            None => canonical_mtime,
        };
        descriptor.local_baseline = Some(baseline);

        if is_newer(remote_ts, baseline) {
            info!(
                remote = %remote_ts,
                baseline = %baseline,
                path = %candidate.display(),
                "remote changed; new version needed"
            );
            descriptor.resolved_path = candidate;
        } else {
            debug!(remote = %remote_ts, baseline = %baseline, "local copy is current");
            descriptor.should_fetch = false;
        }
        Ok(descriptor)
    }

    /// Resolves a batch in order, stopping at the first error.
    ///
    /// # Errors
    ///
    /// The first error [`VersionResolver::resolve`] returns.
    pub async fn resolve_many<I, U, P>(
        &self,
        items: I,
    ) -> Result<Vec<DownloadDescriptor>, FetchError>
    where
        I: IntoIterator<Item = (U, P)>,
        U: AsRef<str>,
        P: AsRef<Path>,
    {
        let mut descriptors = Vec::new();
        for (url, path) in items {
            descriptors.push(self.resolve(url.as_ref(), path.as_ref()).await?);
        }
        let pending = descriptors.iter().filter(|d| d.should_fetch).count();
        info!(pending, total = descriptors.len(), "resolved attachments");
        Ok(descriptors)
    }
}

/// True when `remote` is later than `baseline` by more than the tolerance.
fn is_newer(remote: DateTime<Utc>, baseline: DateTime<Utc>) -> bool {
    let tolerance = TimeDelta::from_std(TIMESTAMP_TOLERANCE).unwrap_or(TimeDelta::seconds(1));
    remote - baseline > tolerance
}

async fn modified_time(path: &Path) -> Result<Option<DateTime<Utc>>, FetchError> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_file() => metadata
            .modified()
            .map(|mtime| Some(DateTime::<Utc>::from(mtime)))
            .map_err(|e| FetchError::io(path, e)),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(FetchError::io(path, e)),
    }
}
