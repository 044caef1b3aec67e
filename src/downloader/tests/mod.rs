use super::*;
use crate::config::DEFAULT_CHUNK_SIZE;
use crate::error::DownloadError;
use crate::types::DownloadOutcome;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener as TokioTcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_context(cap_https: usize, cap_files: usize) -> DownloadContext {
    DownloadContext::new(
        reqwest::Client::new(),
        ConcurrencyGates::new(cap_https, cap_files),
        DEFAULT_CHUNK_SIZE,
    )
}

/// Serve one connection with a raw HTTP head and body, then optionally keep
/// the socket open without sending anything else.
async fn serve_raw_once(head: &'static str, body: &'static [u8], hold_open: bool) -> String {
    let listener = TokioTcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        let _ = socket.read(&mut buf).await;
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(body).await.unwrap();
        socket.flush().await.unwrap();
        if hold_open {
            tokio::time::sleep(Duration::from_secs(10)).await;
        }
    });

    format!("http://{}/data/partial.bin", addr)
}

fn assert_no_file(path: &Path) {
    assert!(
        !path.exists(),
        "no file may be left at {} after a failure",
        path.display()
    );
}

#[tokio::test]
async fn test_download_writes_body_and_reports_size() {
    let server = MockServer::start().await;
    let body = vec![7u8; 20_000];
    Mock::given(method("GET"))
        .and(path("/thredds/fileServer/sst.nc"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let ctx = test_context(2, 2);
    let request = DownloadRequest::new(
        format!("{}/thredds/fileServer/sst.nc", server.uri()),
        temp_dir.path(),
    );

    let result = download_file(&ctx, request).await;

    assert!(result.success(), "{}", result.comment());
    assert_eq!(result.path, temp_dir.path().join("sst.nc"));
    match result.outcome {
        Ok(DownloadOutcome::Completed { bytes, .. }) => assert_eq!(bytes, 20_000),
        other => panic!("expected Completed, got {other:?}"),
    }
    assert_eq!(std::fs::read(temp_dir.path().join("sst.nc")).unwrap(), body);
}

#[tokio::test]
async fn test_comment_records_elapsed_seconds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let result = download_file(
        &test_context(1, 1),
        DownloadRequest::new(format!("{}/hello.txt", server.uri()), temp_dir.path()),
    )
    .await;

    let comment = result.comment();
    assert!(comment.starts_with("Completed in "), "{comment}");
    assert!(comment.ends_with('s'), "{comment}");
}

#[tokio::test]
async fn test_existing_file_short_circuits_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("new content"))
        .expect(0)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let existing = temp_dir.path().join("kept.nc");
    std::fs::write(&existing, b"old content").unwrap();

    let result = download_file(
        &test_context(1, 1),
        DownloadRequest::new(format!("{}/kept.nc", server.uri()), temp_dir.path()),
    )
    .await;

    assert!(result.success());
    assert_eq!(result.outcome.as_ref().unwrap(), &DownloadOutcome::AlreadyExists);
    assert_eq!(result.comment(), "File already exist");
    assert_eq!(std::fs::read(&existing).unwrap(), b"old content");
}

#[tokio::test]
async fn test_not_found_leaves_no_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let result = download_file(
        &test_context(1, 1),
        DownloadRequest::new(format!("{}/missing.nc", server.uri()), temp_dir.path()),
    )
    .await;

    assert!(!result.success());
    assert!(matches!(
        result.error(),
        Some(DownloadError::HttpStatus { status: 404, .. })
    ));
    assert_no_file(&temp_dir.path().join("missing.nc"));
}

#[tokio::test]
async fn test_no_content_status_creates_empty_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let result = download_file(
        &test_context(1, 1),
        DownloadRequest::new(format!("{}/empty.bin", server.uri()), temp_dir.path()),
    )
    .await;

    assert!(result.success(), "{}", result.comment());
    assert_eq!(std::fs::read(temp_dir.path().join("empty.bin")).unwrap().len(), 0);
}

#[tokio::test]
async fn test_truncated_body_is_removed() {
    let url = serve_raw_once(
        "HTTP/1.1 200 OK\r\nContent-Length: 1000\r\nConnection: close\r\n\r\n",
        &[1u8; 100],
        false,
    )
    .await;

    let temp_dir = TempDir::new().unwrap();
    let result = download_file(&test_context(1, 1), DownloadRequest::new(url, temp_dir.path())).await;

    assert!(!result.success());
    assert!(
        matches!(result.error(), Some(DownloadError::Request(_))),
        "expected a transport error, got {:?}",
        result.error()
    );
    assert_no_file(&temp_dir.path().join("partial.bin"));
}

#[tokio::test]
async fn test_stalled_body_times_out_and_is_removed() {
    let url = serve_raw_once(
        "HTTP/1.1 200 OK\r\nContent-Length: 1000\r\n\r\n",
        &[1u8; 100],
        true,
    )
    .await;

    let temp_dir = TempDir::new().unwrap();
    let ctx = test_context(1, 1).with_read_timeout(Duration::from_millis(200));
    let result = download_file(&ctx, DownloadRequest::new(url, temp_dir.path())).await;

    assert!(matches!(
        result.error(),
        Some(DownloadError::Timeout { .. })
    ));
    assert_no_file(&temp_dir.path().join("partial.bin"));
    assert_eq!(ctx.gates.available_https(), 1, "permits must be released");
    assert_eq!(ctx.gates.available_files(), 1, "permits must be released");
}

#[tokio::test]
async fn test_cancellation_aborts_in_flight_download() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("slow")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let token = CancellationToken::new();
    let ctx = test_context(1, 1).with_cancellation(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });

    let result = download_file(
        &ctx,
        DownloadRequest::new(format!("{}/slow.nc", server.uri()), temp_dir.path()),
    )
    .await;
    canceller.await.unwrap();

    assert!(matches!(result.error(), Some(DownloadError::Cancelled)));
    assert_eq!(result.comment(), "download cancelled");
    assert_no_file(&temp_dir.path().join("slow.nc"));
}

#[tokio::test]
async fn test_empty_filename_is_rejected_before_any_io() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let output_dir = temp_dir.path().join("never-created");
    let result = download_file(
        &test_context(1, 1),
        DownloadRequest::new(format!("{}/catalog/", server.uri()), &output_dir),
    )
    .await;

    assert!(matches!(
        result.error(),
        Some(DownloadError::InvalidFilename { .. })
    ));
    assert_eq!(result.path, output_dir);
    assert!(!output_dir.exists());
}

#[tokio::test]
async fn test_nested_output_directory_is_created() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x"))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let nested = temp_dir.path().join("a").join("b").join("c");
    let result = download_file(
        &test_context(1, 1),
        DownloadRequest::new(format!("{}/x.txt", server.uri()), &nested),
    )
    .await;

    assert!(result.success(), "{}", result.comment());
    assert!(nested.join("x.txt").is_file());
}

#[tokio::test]
async fn test_events_bracket_the_write() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 10]))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let (event_tx, mut event_rx) = broadcast::channel(64);
    let ctx = DownloadContext::new(reqwest::Client::new(), ConcurrencyGates::new(1, 1), 4)
        .with_events(event_tx);

    let url = format!("{}/ten.bin", server.uri());
    let result = download_file(&ctx, DownloadRequest::new(url.clone(), temp_dir.path())).await;
    assert!(result.success());

    let mut events = Vec::new();
    while let Ok(event) = event_rx.try_recv() {
        events.push(event);
    }

    let out = temp_dir.path().join("ten.bin");
    assert_eq!(
        events.first(),
        Some(&DownloadEvent::Started {
            url,
            path: out.clone()
        })
    );
    assert_eq!(
        events.last(),
        Some(&DownloadEvent::Finished {
            path: out.clone(),
            success: true
        })
    );

    // 10 bytes in pieces of at most 4
    let progress: Vec<u64> = events
        .iter()
        .filter_map(|e| match e {
            DownloadEvent::Progress { bytes_written, .. } => Some(*bytes_written),
            _ => None,
        })
        .collect();
    assert!(progress.len() >= 3, "expected at least 3 pieces, got {progress:?}");
    assert_eq!(progress.last(), Some(&10));
}

#[tokio::test]
async fn test_batch_rejects_zero_caps() {
    assert!(matches!(
        BatchDownloader::new(DownloadConfig::with_caps(0, 1)),
        Err(crate::error::Error::Config { .. })
    ));
    assert!(smart_download(Vec::new(), 1, 0).await.is_err());
}

#[tokio::test]
async fn test_oversized_cap_is_an_error_not_a_panic() {
    match smart_download(Vec::new(), usize::MAX, 1).await {
        Err(crate::error::Error::Config { key, .. }) => {
            assert_eq!(key.as_deref(), Some("cap_https"))
        }
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn test_context_uses_configured_default_read_timeout() {
    let ctx = test_context(1, 1);
    assert_eq!(ctx.read_timeout, DownloadConfig::default().read_timeout);
}

#[tokio::test]
async fn test_empty_batch_returns_empty_results() {
    let downloader = BatchDownloader::new(DownloadConfig::default()).unwrap();
    let mut events = downloader.subscribe();

    let results = downloader.run(Vec::new()).await.unwrap();

    assert!(results.is_empty());
    assert_eq!(
        events.recv().await.unwrap(),
        DownloadEvent::BatchCompleted {
            total: 0,
            succeeded: 0,
            failed: 0
        }
    );
}
