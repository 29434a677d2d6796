// tests/downloader_test.rs

mod common;

use signtown_anki::{
    client::RobustClient, config::AppConfig, error::AppError, models::JobStatus,
    pipeline::AssetDownloader,
};
use std::{sync::Arc, time::Duration};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};
use tokio_util::sync::CancellationToken;

fn downloader(token: CancellationToken) -> AssetDownloader {
    let client = RobustClient::new(Arc::new(AppConfig::default())).expect("client");
    AssetDownloader::new(Arc::new(client), token)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_download_writes_complete_file() {
    let mut server = mockito::Server::new_async().await;
    let body = vec![7u8; 64 * 1024];
    let mock = server
        .mock("GET", "/videos/s1.mp4")
        .with_status(200)
        .with_body(&body)
        .expect(1)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("media").join("s1.raw.mp4");
    let status = downloader(CancellationToken::new())
        .download(&format!("{}/videos/s1.mp4", server.url()), &dest)
        .await
        .unwrap();

    assert_eq!(status, JobStatus::Success);
    assert_eq!(std::fs::read(&dest).unwrap(), body);
    assert!(common::staging_leftovers(dest.parent().unwrap()).is_empty());
    mock.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_http_error_leaves_no_file() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/videos/missing.mp4")
        .with_status(404)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("missing.raw.mp4");
    let err = downloader(CancellationToken::new())
        .download(&format!("{}/videos/missing.mp4", server.url()), &dest)
        .await
        .unwrap_err();

    assert_eq!(JobStatus::from(&err), JobStatus::HttpError);
    assert!(!err.is_fatal());
    assert!(!dest.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_existing_file_is_not_downloaded_again() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/videos/s1.mp4")
        .with_body("new")
        .expect(0)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("s1.raw.mp4");
    std::fs::write(&dest, b"old").unwrap();

    let status = downloader(CancellationToken::new())
        .download(&format!("{}/videos/s1.mp4", server.url()), &dest)
        .await
        .unwrap();

    assert_eq!(status, JobStatus::Skipped);
    assert_eq!(std::fs::read(&dest).unwrap(), b"old");
    mock.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_empty_body_is_rejected() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/videos/empty.mp4")
        .with_status(200)
        .with_body("")
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("empty.raw.mp4");
    let err = downloader(CancellationToken::new())
        .download(&format!("{}/videos/empty.mp4", server.url()), &dest)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    assert!(!dest.exists());
}

/// 服务器读完请求后声明 1MB，却只发送一小段数据就挂起。取消后不应留下任何文件。
#[tokio::test(flavor = "multi_thread")]
async fn test_cancel_mid_transfer_cleans_up() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            let head = "HTTP/1.1 200 OK\r\nContent-Type: video/mp4\r\nContent-Length: 1048576\r\n\r\n";
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(&[0u8; 4096]).await;
            let _ = socket.flush().await;
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
    });

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("s1.raw.mp4");
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        canceller.cancel();
    });

    let started = std::time::Instant::now();
    let err = downloader(token)
        .download(&format!("http://{}/videos/s1.mp4", addr), &dest)
        .await
        .unwrap_err();

    assert!(err.is_interrupt());
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!dest.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
