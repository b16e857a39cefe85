//! File naming for versioned downloads.
//!
//! For a base path `dir/name.ext` the canonical copy is `dir/name.ext` and
//! every later revision is `dir/name_YYYYMMDD_HHMMSS.ext`, stamped with the
//! remote `Last-Modified` time in UTC.

use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use url::Url;

use crate::error::FetchError;

/// `strftime` layout of the version suffix.
pub const VERSION_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Name used when a URL has no usable last path segment.
const FALLBACK_FILE_NAME: &str = "attachment.bin";

/// Splits a file name at its last dot: `en.subject.pdf` → (`en.subject`, `.pdf`).
///
/// Names without a dot, or whose only dot is leading (`.env`), have an empty extension.
#[must_use]
pub fn split_file_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) if pos > 0 => (&name[..pos], &name[pos..]),
        _ => (name, ""),
    }
}

/// Returns the versioned sibling of `base_path` for `timestamp`.
#[must_use]
pub fn versioned_path(base_path: &Path, timestamp: DateTime<Utc>) -> PathBuf {
    let name = base_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (stem, ext) = split_file_name(&name);
    let suffix = timestamp.format(VERSION_TIMESTAMP_FORMAT);
    base_path.with_file_name(format!("{stem}_{suffix}{ext}"))
}

/// Matches version file names derived from one base name.
#[derive(Debug, Clone)]
pub(crate) struct VersionPattern {
    regex: Regex,
}

impl VersionPattern {
    pub(crate) fn for_base(base_name: &str) -> Result<Self, FetchError> {
        let (stem, ext) = split_file_name(base_name);
        let pattern = format!(
            r"^{}_(\d{{8}}_\d{{6}}){}$",
            regex::escape(stem),
            regex::escape(ext)
        );
        Regex::new(&pattern)
            .map(|regex| Self { regex })
            .map_err(|e| FetchError::io(base_name, std::io::Error::other(e)))
    }

    /// Parses the timestamp out of `file_name`, if it is a version of the base.
    pub(crate) fn timestamp_of(&self, file_name: &str) -> Option<DateTime<Utc>> {
        let captures = self.regex.captures(file_name)?;
        let raw = captures.get(1)?.as_str();
        NaiveDateTime::parse_from_str(raw, VERSION_TIMESTAMP_FORMAT)
            .ok()
            .map(|naive| naive.and_utc())
    }
}

/// Scans the directory of `base_path` for versions and returns the newest.
///
/// A missing directory means no versions.
pub(crate) async fn newest_version(
    base_path: &Path,
) -> Result<Option<(DateTime<Utc>, PathBuf)>, FetchError> {
    let Some(base_name) = base_path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return Ok(None);
    };
    let pattern = VersionPattern::for_base(&base_name)?;
    let dir = parent_dir(base_path);

    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(FetchError::io(dir, e)),
    };

    let mut newest: Option<(DateTime<Utc>, PathBuf)> = None;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| FetchError::io(&dir, e))?
    {
        let file_name = entry.file_name();
        let Some(timestamp) = pattern.timestamp_of(&file_name.to_string_lossy()) else {
            continue;
        };
        if newest.as_ref().is_none_or(|(current, _)| timestamp > *current) {
            newest = Some((timestamp, entry.path()));
        }
    }
    Ok(newest)
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Sanitizes a file name for filesystem safety.
///
/// Replaces characters that are invalid on common filesystems
/// (`/ \ : * ? " < > |` and control characters) with `_`.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.trim_matches('_').is_empty() {
        return FALLBACK_FILE_NAME.to_string();
    }
    if is_safe_file_name(&sanitized) {
        sanitized
    } else {
        sanitized.replace('.', "_")
    }
}

fn is_safe_file_name(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

/// Derives a local file name from an attachment URL's last path segment.
///
/// The segment is percent-decoded, then sanitized.
#[must_use]
pub fn attachment_file_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|last| !last.is_empty())
        .map(|last| {
            let decoded =
                urlencoding::decode(last).map_or_else(|_| last.to_string(), |d| d.into_owned());
            sanitize_file_name(&decoded)
        })
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn may_9() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 9, 14, 16, 12).unwrap()
    }

    #[test]
    fn test_split_file_name_at_last_dot() {
        assert_eq!(split_file_name("en.subject.pdf"), ("en.subject", ".pdf"));
        assert_eq!(split_file_name("README"), ("README", ""));
        assert_eq!(split_file_name(".env"), (".env", ""));
        assert_eq!(split_file_name("archive.tar.gz"), ("archive.tar", ".gz"));
    }

    #[test]
    fn test_versioned_path_uses_remote_timestamp() {
        let path = versioned_path(Path::new("downloads/en.subject.pdf"), may_9());
        assert_eq!(path, PathBuf::from("downloads/en.subject_20250509_141612.pdf"));
    }

    #[test]
    fn test_versioned_path_without_extension() {
        let path = versioned_path(Path::new("out/Makefile"), may_9());
        assert_eq!(path, PathBuf::from("out/Makefile_20250509_141612"));
    }

    #[test]
    fn test_pattern_only_matches_own_versions() {
        let pattern = VersionPattern::for_base("en.subject.pdf").unwrap();
        assert_eq!(pattern.timestamp_of("en.subject_20250509_141612.pdf"), Some(may_9()));
        assert_eq!(pattern.timestamp_of("en.subject.pdf"), None);
        assert_eq!(pattern.timestamp_of("enXsubject_20250509_141612.pdf"), None);
        assert_eq!(pattern.timestamp_of("fr.subject_20250509_141612.pdf"), None);
        assert_eq!(pattern.timestamp_of("en.subject_20250509_141612.pdf.part"), None);
        assert_eq!(pattern.timestamp_of("en.subject_20251399_999999.pdf"), None);
    }

    #[tokio::test]
    async fn test_newest_version_picks_latest_timestamp() {
        let dir = TempDir::new().unwrap();
        for name in [
            "en.subject.pdf",
            "en.subject_20240101_000000.pdf",
            "en.subject_20250509_141612.pdf",
            "en.subject_20241231_235959.pdf",
            "other_20991231_235959.pdf",
        ] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let (timestamp, path) = newest_version(&dir.path().join("en.subject.pdf"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(timestamp, may_9());
        assert_eq!(path, dir.path().join("en.subject_20250509_141612.pdf"));
    }

    #[tokio::test]
    async fn test_newest_version_missing_dir_is_none() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("nope").join("a.pdf");
        assert!(newest_version(&base).await.unwrap().is_none());
    }

    #[test]
    fn test_sanitize_file_name_removes_invalid_chars() {
        assert_eq!(sanitize_file_name("a/b:c.pdf"), "a_b_c.pdf");
        assert_eq!(sanitize_file_name(".."), "__");
        assert_eq!(sanitize_file_name("///"), FALLBACK_FILE_NAME);
    }

    #[test]
    fn test_attachment_file_name_decodes_segment() {
        let url = Url::parse("https://cdn.intra.42.fr/document/42/en%20subject.pdf?v=1").unwrap();
        assert_eq!(attachment_file_name(&url), "en subject.pdf");

        let bare = Url::parse("https://cdn.intra.42.fr/").unwrap();
        assert_eq!(attachment_file_name(&bare), FALLBACK_FILE_NAME);
    }
}
