//! Integration tests for the attachment downloader.
//!
//! A download either lands complete at its destination or leaves nothing
//! there: no zero-byte file, no truncated body, no stray `.part` file.

use std::path::Path;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use intra42::{AttachmentDownloader, ErrorKind, FetchError, Session, SessionConfig};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn downloader_for(server: &MockServer, config: SessionConfig) -> AttachmentDownloader {
    let session = Session::builder()
        .config(config)
        .base_url(server.uri())
        .build()
        .unwrap();
    AttachmentDownloader::new(session)
}

/// Lists every entry left in `dir`, recursively, relative to it.
fn leftovers(dir: &Path) -> Vec<String> {
    let mut names = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current).unwrap() {
            let entry = entry.unwrap();
            if entry.file_type().unwrap().is_dir() {
                pending.push(entry.path());
            } else {
                names.push(
                    entry
                        .path()
                        .strip_prefix(dir)
                        .unwrap()
                        .to_string_lossy()
                        .into_owned(),
                );
            }
        }
    }
    names.sort();
    names
}

#[tokio::test]
async fn test_download_writes_body_and_creates_parents() {
    let mock_server = MockServer::start().await;
    let body = vec![7u8; 256 * 1024];
    Mock::given(method("GET"))
        .and(path("/uploads/en.subject.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("cursus").join("libft").join("en.subject.pdf");
    let written = downloader_for(&mock_server, SessionConfig::default())
        .download("/uploads/en.subject.pdf", &destination)
        .await
        .unwrap();

    assert_eq!(written, body.len() as u64);
    assert_eq!(std::fs::read(&destination).unwrap(), body);
    assert_eq!(leftovers(dir.path()), vec!["cursus/libft/en.subject.pdf"]);
}

#[tokio::test]
async fn test_download_stamps_remote_last_modified() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/uploads/en.subject.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Last-Modified", "Fri, 09 May 2025 14:16:12 GMT")
                .set_body_bytes(b"pdf".to_vec()),
        )
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("en.subject.pdf");
    downloader_for(&mock_server, SessionConfig::default())
        .download("/uploads/en.subject.pdf", &destination)
        .await
        .unwrap();

    let mtime = std::fs::metadata(&destination).unwrap().modified().unwrap();
    let expected = Utc.with_ymd_and_hms(2025, 5, 9, 14, 16, 12).unwrap();
    assert_eq!(chrono::DateTime::<Utc>::from(mtime), expected);
}

#[tokio::test]
async fn test_download_overwrites_existing_destination() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("fresh"))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("a.txt");
    std::fs::write(&destination, "stale contents").unwrap();

    let written = downloader_for(&mock_server, SessionConfig::default())
        .download("/a.txt", &destination)
        .await
        .unwrap();
    assert_eq!(written, 5);
    assert_eq!(std::fs::read_to_string(&destination).unwrap(), "fresh");
}

#[tokio::test]
async fn test_timeout_leaves_no_file() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"late".to_vec())
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("slow.pdf");
    let error = downloader_for(&mock_server, SessionConfig::with_limits(1, 1, 4))
        .download("/slow.pdf", &destination)
        .await
        .unwrap_err();

    assert!(matches!(error, FetchError::Timeout { .. }), "got: {error:?}");
    assert_eq!(error.kind(), ErrorKind::Transient);
    assert!(leftovers(dir.path()).is_empty());
}

/// Accepts one connection, announces 4096 bytes, sends 100 and hangs up.
async fn serve_cut_body() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 1024];
        let _ = socket.read(&mut request).await;
        let head = "HTTP/1.1 200 OK\r\nContent-Length: 4096\r\nConnection: close\r\n\r\n";
        let _ = socket.write_all(head.as_bytes()).await;
        let _ = socket.write_all(&[1u8; 100]).await;
        let _ = socket.shutdown().await;
    });
    format!("http://{addr}/cut.pdf")
}

#[tokio::test]
async fn test_connection_drop_mid_body_leaves_no_file() {
    let url = serve_cut_body().await;
    let session = Session::new(SessionConfig::with_limits(2, 5, 4)).unwrap();

    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("cut.pdf");
    let result = AttachmentDownloader::new(session)
        .download(&url, &destination)
        .await;

    assert!(result.is_err(), "short body must fail: {result:?}");
    assert!(result.unwrap_err().is_retriable());
    assert!(!destination.exists());
    assert!(leftovers(dir.path()).is_empty());
}

#[tokio::test]
async fn test_error_status_leaves_existing_destination_untouched() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/private.pdf"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("private.pdf");
    std::fs::write(&destination, "previous revision").unwrap();

    let error = downloader_for(&mock_server, SessionConfig::default())
        .download("/private.pdf", &destination)
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Auth);
    assert_eq!(
        std::fs::read_to_string(&destination).unwrap(),
        "previous revision"
    );
    assert_eq!(leftovers(dir.path()), vec!["private.pdf"]);
}

#[tokio::test]
async fn test_dropped_download_leaves_no_file() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/big.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![0u8; 1024])
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("big.pdf");
    let downloader = downloader_for(&mock_server, SessionConfig::default());

    let interrupted = tokio::time::timeout(
        Duration::from_millis(100),
        downloader.download("/big.pdf", &destination),
    )
    .await;

    assert!(interrupted.is_err(), "download should still be pending");
    assert!(leftovers(dir.path()).is_empty());
}
